use clap::{Parser, ValueEnum};
use eyre::{eyre, Result};
use memres::output::Format;
use memres::{
    run_probe, ArenaAlloc, Backend, MemoryResource, ProbeRequest, ResourceAdaptor, SystemAlloc,
    TrackingAlloc,
};

/// `MAX_ALIGN` values the binary is compiled for.
const SUPPORTED_MAX_ALIGNS: [usize; 7] = [8, 16, 32, 64, 128, 256, 4096];

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    System,
    Tracking,
    Arena,
}

#[derive(Debug, Parser)]
pub struct ProbeArgs {
    #[arg(
        long,
        value_enum,
        default_value_t = BackendKind::System,
        help = "Block allocator behind the adaptor"
    )]
    pub backend: BackendKind,

    #[arg(
        long,
        default_value_t = 16,
        value_parser = parse_max_align,
        help = "Largest alignment the adaptor serves (8, 16, 32, 64, 128, 256 or 4096)"
    )]
    pub max_align: usize,

    #[arg(
        long,
        default_value_t = 1 << 20,
        help = "Capacity in bytes of the arena backend"
    )]
    pub arena_capacity: usize,

    #[arg(
        long,
        value_enum,
        default_value_t = Format::Table,
        help = "Output format (env: MEMRES_JSON=1 forces json)"
    )]
    pub format: Format,

    #[arg(required = true, value_name = "BYTES:ALIGN", help = "Requests to serve; ALIGN 0 means natural alignment")]
    pub requests: Vec<ProbeRequest>,
}

impl ProbeArgs {
    pub fn run(&self) -> Result<()> {
        let max_align = self.max_align;

        let report = match self.backend {
            BackendKind::System => {
                let resource = boxed_adaptor(SystemAlloc, max_align)?;
                run_probe(resource.as_ref(), max_align, &self.requests)
            }
            BackendKind::Tracking => {
                let tracking = TrackingAlloc::new();
                let resource = boxed_adaptor(tracking.clone(), max_align)?;
                run_probe(resource.as_ref(), max_align, &self.requests)
                    .with_tracking(tracking.stats())
            }
            BackendKind::Arena => {
                let arena = ArenaAlloc::with_capacity(self.arena_capacity)?;
                let resource = boxed_adaptor(arena, max_align)?;
                run_probe(resource.as_ref(), max_align, &self.requests)
            }
        };

        self.format
            .with_env_override()
            .reporter()
            .report(&report)
            .map_err(|e| eyre!("failed to print report: {}", e))
    }
}

macro_rules! adaptor_for {
    ($backend:expr, $max_align:expr, [$($align:literal),*]) => {
        match $max_align {
            $(
                $align => Box::new(ResourceAdaptor::<_, $align>::new($backend))
                    as Box<dyn MemoryResource>,
            )*
            other => return Err(eyre!("unsupported max alignment {}", other)),
        }
    };
}

fn boxed_adaptor<A: Backend>(backend: A, max_align: usize) -> Result<Box<dyn MemoryResource>> {
    Ok(adaptor_for!(backend, max_align, [8, 16, 32, 64, 128, 256, 4096]))
}

fn parse_max_align(s: &str) -> Result<usize, String> {
    let value: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid max alignment: {}", s))?;

    if SUPPORTED_MAX_ALIGNS.contains(&value) {
        Ok(value)
    } else {
        Err(format!(
            "max alignment must be one of {:?}, got {}",
            SUPPORTED_MAX_ALIGNS, value
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_align() {
        assert_eq!(parse_max_align("64"), Ok(64));
        assert!(parse_max_align("48").is_err());
        assert!(parse_max_align("big").is_err());
    }

    #[test]
    fn test_every_supported_max_align_builds() {
        for max_align in SUPPORTED_MAX_ALIGNS {
            let resource = boxed_adaptor(SystemAlloc, max_align).unwrap();
            let block = resource.allocate(max_align, max_align).unwrap();
            assert_eq!(block.as_ptr() as usize % max_align, 0);
            unsafe { resource.deallocate(block, max_align, max_align) };
        }
        assert!(boxed_adaptor(SystemAlloc, 48).is_err());
    }
}

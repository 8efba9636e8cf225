use clap::{Parser, ValueEnum};
use colored::*;
use eyre::{eyre, Result};
use memres::output::Format;
use memres::{
    get_default_resource, new_delete_resource, null_memory_resource, same_object,
    DefaultResourceGuard, MemoryResource,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StandardResource {
    NewDelete,
    Null,
}

#[derive(Debug, Parser)]
pub struct DefaultArgs {
    #[arg(
        long,
        value_enum,
        help = "Install a standard resource as the default before reporting it"
    )]
    pub install: Option<StandardResource>,

    #[arg(
        long,
        value_enum,
        default_value_t = Format::Table,
        help = "Output format (env: MEMRES_JSON=1 forces json)"
    )]
    pub format: Format,
}

#[derive(Debug, Serialize)]
struct DefaultResourceInfo {
    resource: &'static str,
    address: usize,
    is_new_delete: bool,
    /// Whether a one-byte allocation from the default succeeds.
    allocates: bool,
}

impl DefaultResourceInfo {
    fn current() -> Self {
        let resource = get_default_resource();
        let allocates = match resource.allocate(1, 1) {
            Ok(block) => {
                unsafe { resource.deallocate(block, 1, 1) };
                true
            }
            Err(_) => false,
        };

        Self {
            resource: resource.type_label(),
            address: resource as *const dyn MemoryResource as *const () as usize,
            is_new_delete: same_object(resource, new_delete_resource()),
            allocates,
        }
    }
}

impl DefaultArgs {
    pub fn run(&self) -> Result<()> {
        let _guard = self.install.map(|standard| {
            DefaultResourceGuard::install(match standard {
                StandardResource::NewDelete => new_delete_resource(),
                StandardResource::Null => null_memory_resource(),
            })
        });

        let info = DefaultResourceInfo::current();

        match self.format.with_env_override() {
            Format::Table => {
                println!(
                    "{} default resource: {}",
                    "[memres]".blue().bold(),
                    info.resource.yellow().bold()
                );
                println!("  address:       {:#x}", info.address);
                println!("  new/delete:    {}", info.is_new_delete);
                println!("  allocates:     {}", info.allocates);
            }
            Format::Json => {
                println!(
                    "{}",
                    serde_json::to_string(&info).map_err(|e| eyre!("{}", e))?
                );
            }
            Format::JsonPretty => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&info).map_err(|e| eyre!("{}", e))?
                );
            }
        }

        Ok(())
    }
}

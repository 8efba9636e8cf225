#[cfg(test)]
pub mod tests {
    use serde_json::Value;
    use std::process::Command;

    fn run_example(name: &str) -> Value {
        let output = Command::new("cargo")
            .args(["run", "-p", "test-resources", "--example", name])
            .output()
            .expect("Failed to execute command");

        assert!(
            output.status.success(),
            "Command failed with status: {}\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(&stdout)
            .unwrap_or_else(|e| panic!("Invalid JSON ({e}):\n{stdout}"))
    }

    // cargo run -p test-resources --example scenario
    #[test]
    fn test_scenario_output() {
        let json = run_example("scenario");

        assert_eq!(json["max_alignment"], 64);
        assert_eq!(json["overlaps"], 0);

        let outcomes = json["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 6);

        assert_eq!(outcomes[0]["aligned"], true);
        assert_eq!(outcomes[0]["chunks"], 4);
        assert_eq!(outcomes[1]["resolved_alignment"], 2);
        assert!(outcomes[2]["error"]
            .as_str()
            .unwrap()
            .contains("exceeds the supported maximum of 64"));
        assert_eq!(outcomes[3]["resolved_alignment"], 64);
        assert_eq!(outcomes[4]["chunks"], 64);
        assert!(outcomes[5]["error"]
            .as_str()
            .unwrap()
            .contains("not a power of two"));

        let tracking = &json["tracking"];
        assert_eq!(tracking["live_blocks"], 0);
        assert_eq!(tracking["mismatches"], 0);
        assert_eq!(tracking["blocks_allocated"], 4);
    }

    // cargo run -p test-resources --example concurrent_default
    #[test]
    fn test_concurrent_default_output() {
        let json = run_example("concurrent_default");

        assert_eq!(json["first_distinct"], 1);
        assert_eq!(json["first_is_new_delete"], true);
        assert_eq!(json["previous_was_new_delete"], true);
        assert_eq!(json["second_distinct"], 1);
        assert_eq!(json["second_is_adaptor"], true);
        assert_eq!(json["restored_from_adaptor"], true);
        assert_eq!(json["final_is_new_delete"], true);
    }

    // cargo run -p test-resources --example arena_routing
    #[test]
    fn test_arena_routing_output() {
        let json = run_example("arena_routing");

        let report = &json["report"];
        assert_eq!(report["max_alignment"], 256);
        assert_eq!(report["overlaps"], 0);

        let outcomes = report["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 10);
        for outcome in &outcomes[..9] {
            assert_eq!(outcome["aligned"], true, "{outcome}");
        }
        assert!(outcomes[9]["address"].is_null());

        // Probe blocks are freed newest first, so the arena rolls all the way
        // back.
        assert_eq!(json["used_after_probe"], 0);
        assert_eq!(json["boxed_aligned"], true);
        assert_eq!(json["boxed_sum"], 28);
    }
}

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use wn_app::{RunHandle, RunOptions, RunRequest, network_service, run};

fn demos_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/networks")
}

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    dir
}

#[test]
fn demo_networks_compile() {
    let dir = demos_dir();
    if !dir.exists() {
        eprintln!("Warning: demo networks not found at {:?}, skipping", dir);
        return;
    }
    for name in ["01_two_node.yaml", "02_tank_drain.yaml", "03_pumped_loop.yaml"] {
        let def = network_service::load_network(&dir.join(name))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        network_service::compile_network(&def).unwrap_or_else(|e| panic!("{name}: {e}"));
    }
}

#[test]
fn gravity_demos_run_to_completion() {
    let dir = demos_dir();
    if !dir.exists() {
        return;
    }
    let out = unique_temp_dir("wn_app_demos");
    for name in ["01_two_node.yaml", "02_tank_drain.yaml"] {
        let path = dir.join(name);
        let request = RunRequest {
            network_path: &path,
            out_dir: Some(&out),
            options: RunOptions {
                use_cache: false,
                ..RunOptions::default()
            },
        };
        let response = run(&request, &RunHandle::new()).unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(response.manifest.hydraulic_steps >= 1);
        assert_eq!(response.timing.unbalanced_steps, 0);
    }
    let _ = std::fs::remove_dir_all(&out);
}

use std::path::Path;
use std::sync::mpsc;

use libjpet_reco::config::{Config, WindowMode};
use libjpet_reco::mc_builder::McBuilder;
use libjpet_reco::mc_file::McFile;
use libjpet_reco::process::{process_file, process_subset};
use libjpet_reco::sink::{MemorySink, WindowSink};
use libjpet_reco::smearing::FormulaConfig;
use libjpet_reco::worker_status::WorkerStatus;

const HEADER: &str = "event_id,time_s,energy_mev,x_mm,y_mm,z_mm,module_id,sector_id,crystal_id\n";

fn write_interactions(path: &Path) {
    let mut csv = String::from(HEADER);
    // two events in the first 20 us window, one in the third
    csv.push_str("1,1.0e-9,0.341,400,10,-50,0,0,0\n");
    csv.push_str("1,1.2e-9,0.005,-400,10,80,0,6,1\n");
    csv.push_str("2,5.0e-6,0.511,0,420,0,0,5,12\n");
    csv.push_str("3,4.5e-5,0.200,0,-420,100,0,7,0\n");
    std::fs::write(path, csv).unwrap();
}

fn mc_config(dir: &Path, input: &Path) -> Config {
    let output_path = dir.join("out");
    if !output_path.exists() {
        std::fs::create_dir(&output_path).unwrap();
    }
    let mut config = Config {
        input_files: vec![input.to_path_buf()],
        output_path,
        make_histograms: true,
        ..Default::default()
    };
    config.mc.smearing.seed = 1234;
    config
}

#[test]
fn boundary_windows_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sim.csv");
    write_interactions(&input);
    let config = mc_config(dir.path(), &input);

    let mut file = McFile::new(&input).unwrap();
    let mut builder = McBuilder::from_config(&config.mc).unwrap();
    let mut sink = MemorySink::default();
    while let Some(pack) = file.get_next_event_pack().unwrap() {
        for window in builder.process_event_pack(&pack).unwrap() {
            sink.write_mc_window(&window).unwrap();
        }
    }
    if let Some(window) = builder.flush_final() {
        sink.write_mc_window(&window).unwrap();
    }
    sink.close().unwrap();

    assert!(sink.is_closed);
    assert_eq!(sink.mc_windows.len(), 2);
    let first = &sink.mc_windows[0];
    assert_eq!(first.index, 0);
    assert_eq!(first.len(), 3);
    let ids: Vec<i32> = first.hits.iter().map(|pair| pair.raw.scin_id).collect();
    assert_eq!(ids, vec![266, 501, 213]);
    // 5 keV deposit is far below the 10 keV threshold
    assert!(first.hits[1].reco.is_none());
    assert!(first.hits[0].reco.is_some());

    let last = &sink.mc_windows[1];
    assert_eq!(last.index, 2);
    assert_eq!(last.hits[0].raw.scin_id, 487);
    assert!((last.hits[0].raw.time - 5.0e6).abs() < 1e-3);
}

#[test]
fn same_seed_gives_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sim.csv");
    write_interactions(&input);
    let mut config = mc_config(dir.path(), &input);
    config.mc.window_mode = WindowMode::Activity;

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let (tx, _rx) = mpsc::channel::<WorkerStatus>();
        process_file(&config, &input, &tx, &0).unwrap();
        outputs.push(std::fs::read_to_string(config.output_path.join("sim.yml")).unwrap());
    }
    assert_eq!(outputs[0], outputs[1]);
    assert!(config.output_path.join("sim.stats.yml").exists());
}

#[test]
fn single_event_windows_and_max_entries() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sim.mc");
    write_interactions(&input);
    let mut config = mc_config(dir.path(), &input);
    config.mc.single_event_per_window = true;
    config.max_entries = Some(2);

    let (tx, _rx) = mpsc::channel::<WorkerStatus>();
    process_subset(config.clone(), tx, 0, config.input_files.clone()).unwrap();
    let output = std::fs::read_to_string(config.output_path.join("sim.yml")).unwrap();
    assert_eq!(output.matches("---").count(), 2);
}

#[test]
fn bad_smearing_formula_fails_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sim.csv");
    write_interactions(&input);
    let mut config = mc_config(dir.path(), &input);
    config.mc.smearing.use_default_z = false;
    config.mc.smearing.z_formula = Some(FormulaConfig {
        expression: "round(z".to_string(),
        parameters: vec![],
        limits: None,
    });
    let (tx, _rx) = mpsc::channel::<WorkerStatus>();
    assert!(process_file(&config, &input, &tx, &0).is_err());
}

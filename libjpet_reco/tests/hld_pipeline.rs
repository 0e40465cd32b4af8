use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use approx::assert_relative_eq;
use libjpet_reco::calibration::CalibrationTable;
use libjpet_reco::config::Config;
use libjpet_reco::error::{HldFileError, HldFrameError, UnpackerError};
use libjpet_reco::hld_file::HldFile;
use libjpet_reco::hld_frame::align8;
use libjpet_reco::process::process_file;
use libjpet_reco::tdc_edge::{group_channels, Edge};
use libjpet_reco::tdc_map::TdcMap;
use libjpet_reco::unpacker::{full_time, TdcDecoder, Unpacker};
use libjpet_reco::worker_status::WorkerStatus;

const ADDRESS: u32 = 0xa110;
const UNKNOWN_ADDRESS: u32 = 0xffff;

fn time_word(channel: u32, fine: u32, rising: bool, coarse: u32) -> u32 {
    (4 << 29) | (channel << 22) | (fine << 12) | ((rising as u32) << 11) | coarse
}

fn epoch_word(epoch: u32) -> u32 {
    (3 << 29) | epoch
}

fn write_word(bytes: &mut Vec<u8>, word: u32, swap: bool) {
    if swap {
        bytes.write_u32::<BigEndian>(word).unwrap();
    } else {
        bytes.write_u32::<LittleEndian>(word).unwrap();
    }
}

/// One record with a single sub-record holding the given TDC blocks
fn record(seq_nr: u32, blocks: &[(u32, Vec<u32>)], swap: bool) -> Vec<u8> {
    let mut words = Vec::new();
    for (address, data) in blocks {
        words.push(((data.len() as u32) << 16) | address);
        words.extend(data);
    }
    let data_size = words.len() * 4;
    let full_size = 32 + 16 + align8(data_size);

    let mut bytes = Vec::new();
    for field in [full_size as u32, 0x0003_0001, 0x2, seq_nr, 0, 0, 7, 0] {
        bytes.write_u32::<LittleEndian>(field).unwrap();
    }
    for field in [(16 + data_size) as u32, 0x0002_0001, 0x8000, seq_nr] {
        write_word(&mut bytes, field, swap);
    }
    for word in words {
        write_word(&mut bytes, word, swap);
    }
    bytes.resize(align8(full_size), 0);
    bytes
}

fn write_hld(path: &Path, records: &[Vec<u8>]) {
    let mut bytes = vec![0u8; 32];
    for rec in records {
        bytes.extend(rec);
    }
    std::fs::write(path, bytes).unwrap();
}

fn physics_records(swap: bool) -> Vec<Vec<u8>> {
    vec![
        record(
            1,
            &[(
                ADDRESS,
                vec![
                    epoch_word(1),
                    time_word(0, 0, true, 100),
                    time_word(3, 0, true, 120),
                    time_word(3, 0, false, 140),
                ],
            )],
            swap,
        ),
        record(
            2,
            &[
                (UNKNOWN_ADDRESS, vec![time_word(0, 0, true, 1)]),
                (
                    ADDRESS,
                    vec![time_word(5, 0, true, 10), time_word(0, 0x3ff, true, 11)],
                ),
            ],
            swap,
        ),
    ]
}

fn open_unpacker(path: &Path) -> Unpacker {
    let file = HldFile::new(path).unwrap().with_end_margin(0);
    Unpacker::new(
        file,
        TdcDecoder::new(TdcMap::from_pairs(&[(ADDRESS, 100)]), CalibrationTable::default()),
    )
}

#[test]
fn decodes_swapped_and_native_files_alike() {
    let dir = tempfile::tempdir().unwrap();
    for swap in [true, false] {
        let path = dir.path().join(format!("run_{swap}.hld"));
        write_hld(&path, &physics_records(swap));
        let mut unpacker = open_unpacker(&path);
        assert_eq!(unpacker.get_file().word_order().invert, swap);

        let first = unpacker.get_next_record().unwrap().unwrap();
        assert_eq!(first.seq_nr, 1);
        assert_eq!(first.edges.len(), 2);
        assert_eq!(first.edges[0].global_channel, 103);
        assert_eq!(first.edges[1].edge, Edge::Falling);
        assert_relative_eq!(first.edges[0].full_time, full_time(1, 120, 0));
        assert_relative_eq!(first.edges[0].relative_time, 100.0);
        assert_relative_eq!(first.edges[1].relative_time, 200.0);
        let channels = group_channels(&first.edges);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].leads, vec![100.0]);
        assert_eq!(channels[0].trails, vec![200.0]);

        // unknown endpoint skipped, channel 5 has no reference yet, invalid fine dropped
        let second = unpacker.get_next_record().unwrap().unwrap();
        assert_eq!(second.seq_nr, 2);
        assert!(second.edges.is_empty());

        assert!(unpacker.get_next_record().unwrap().is_none());
        assert_eq!(unpacker.get_file().entries_read(), 2);
    }
}

#[test]
fn first_record_timestamp_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dated.hld");
    let mut records = physics_records(true);
    // 2021-05-23 13:05:42
    records[0][16..20].copy_from_slice(&((121u32 << 16) | (4 << 8) | 23).to_le_bytes());
    records[0][20..24].copy_from_slice(&((13u32 << 16) | (5 << 8) | 42).to_le_bytes());
    write_hld(&path, &records);

    let mut unpacker = open_unpacker(&path);
    assert!(unpacker.get_file().first_timestamp().is_none());
    unpacker.get_next_record().unwrap();
    let ts = unpacker.get_file().first_timestamp().unwrap();
    assert_eq!(ts.year(), 2021);
    assert_eq!(ts.day(), 23);
    assert_eq!(ts.second(), 42);
}

#[test]
fn empty_records_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.hld");
    let mut empty = Vec::new();
    for field in [32u32, 0x0003_0001, 0x2, 9, 0, 0, 7, 0] {
        empty.write_u32::<LittleEndian>(field).unwrap();
    }
    let mut records = physics_records(true);
    records.insert(1, empty);
    write_hld(&path, &records);

    let mut unpacker = open_unpacker(&path);
    let mut seq = Vec::new();
    while let Some(record) = unpacker.get_next_record().unwrap() {
        seq.push(record.seq_nr);
    }
    assert_eq!(seq, vec![1, 2]);
    assert_eq!(unpacker.empty_records(), 1);
}

#[test]
fn max_entries_stops_reading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("limited.hld");
    write_hld(&path, &physics_records(true));
    let file = HldFile::new(&path)
        .unwrap()
        .with_end_margin(0)
        .with_max_entries(Some(1));
    let mut unpacker = Unpacker::new(
        file,
        TdcDecoder::new(TdcMap::from_pairs(&[(ADDRESS, 0)]), CalibrationTable::default()),
    );
    assert!(unpacker.get_next_record().unwrap().is_some());
    assert!(unpacker.get_next_record().unwrap().is_none());
}

#[test]
fn corrupted_size_is_fatal_for_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.hld");
    let mut records = physics_records(true);
    // declare a second record far larger than what is left in the file
    records[1][0..4].copy_from_slice(&100_000u32.to_le_bytes());
    write_hld(&path, &records);

    let mut unpacker = open_unpacker(&path);
    assert!(unpacker.get_next_record().unwrap().is_some());
    let err = unpacker.get_next_record().unwrap_err();
    assert!(matches!(
        err,
        UnpackerError::FileError(HldFileError::BadFrame(HldFrameError::CorruptedSize { .. }))
    ));
    assert!(unpacker.get_next_record().unwrap().is_none());
}

#[test]
fn broken_tdc_block_ends_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken_block.hld");
    let mut records = physics_records(true);
    let mut broken = record(3, &[(ADDRESS, vec![time_word(0, 0, true, 1)])], true);
    // the block header claims 9 data words but carries one
    broken[48..52].copy_from_slice(&((9u32 << 16) | ADDRESS).to_be_bytes());
    records.insert(1, broken);
    write_hld(&path, &records);

    let mut unpacker = open_unpacker(&path);
    assert_eq!(unpacker.get_next_record().unwrap().unwrap().seq_nr, 1);
    let err = unpacker.get_next_record().unwrap_err();
    assert!(matches!(
        err,
        UnpackerError::FrameError(HldFrameError::BlockOverrun { .. })
    ));
    // the record after the broken one is never decoded
    assert!(unpacker.get_next_record().unwrap().is_none());
    assert!(unpacker.get_file().is_eof());
}

#[test]
fn process_file_writes_windows_and_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("dabc_001.hld");
    let mut records = physics_records(true);
    records.insert(
        0,
        record(
            0,
            &[(ADDRESS, vec![time_word(0, 0, true, 5), time_word(1, 0, true, 6)])],
            true,
        ),
    );
    // trailing filler so that the records above sit before the end of file margin
    records.push(record(3, &[(UNKNOWN_ADDRESS, vec![0x1; 150])], true));
    write_hld(&input, &records);

    let map_path = dir.path().join("tdc_map.csv");
    std::fs::write(&map_path, "address,channel_offset\n0xa110,0\n").unwrap();
    let output_dir = dir.path().join("out");
    std::fs::create_dir(&output_dir).unwrap();

    let mut config = Config {
        input_files: vec![input.clone()],
        output_path: output_dir.clone(),
        make_histograms: true,
        ..Default::default()
    };
    config.unpacker.tdc_map_path = Some(map_path);

    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    process_file(&config, &input, &tx, &0).unwrap();
    drop(tx);
    let statuses: Vec<WorkerStatus> = rx.iter().collect();
    assert_eq!(statuses.first().unwrap().progress, 0.0);
    assert_eq!(statuses.last().unwrap().progress, 1.0);

    let output = std::fs::read_to_string(output_dir.join("dabc_001.yml")).unwrap();
    // records 0 and 1 carry edges, 2 and the filler do not
    assert_eq!(output.matches("---").count(), 2);
    assert!(output.contains("global_channel: 3"));
    assert!(output.contains("leads:"));

    let stats_path: PathBuf = output_dir.join("dabc_001.stats.yml");
    let stats = std::fs::read_to_string(stats_path).unwrap();
    assert!(stats.contains("edges_per_time_window"));
}

#[test]
fn hld_input_without_tdc_map_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run.hld");
    write_hld(&input, &physics_records(true));
    let config = Config {
        output_path: dir.path().to_path_buf(),
        ..Default::default()
    };
    let (tx, _rx) = mpsc::channel::<WorkerStatus>();
    assert!(process_file(&config, &input, &tx, &0).is_err());
}

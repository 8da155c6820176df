// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tests for the format backends and curation layer.
//!
//! Run with: cargo test --test io_tests

mod common;

use common::{write_binary, write_legacy, write_spikeglx_run, TempDir};
use ephysio::io::formats::backend_for;
use ephysio::io::npy::read_npy;
use ephysio::{CurationSorting, EphysError, FormatTag, OpenOptions, Sorting, StreamKind};

#[test]
fn test_backend_tags() {
    for tag in [
        FormatTag::OpenEphysLegacy,
        FormatTag::OpenEphysBinary,
        FormatTag::SpikeGlx,
    ] {
        assert_eq!(backend_for(tag).tag(), tag);
    }
}

#[test]
fn test_spikeglx_streams_and_kinds() {
    let dir = TempDir::new("io_glx_streams");
    write_spikeglx_run(dir.path());

    let backend = backend_for(FormatTag::SpikeGlx);
    let streams = backend
        .list_streams(dir.path(), &OpenOptions::default())
        .unwrap();
    let names: Vec<&str> = streams.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["imec0.ap", "imec0.lf", "nidq"]);
    assert_eq!(streams[0].kind, StreamKind::Probe);
    assert_eq!(streams[1].kind, StreamKind::Probe);
    assert_eq!(streams[2].kind, StreamKind::Auxiliary);
    assert_eq!(streams[0].sample_rate, Some(30000.0));
    assert_eq!(streams[0].channel_count, 4);

    let with_sync = backend
        .list_streams(dir.path(), &OpenOptions::default().with_sync_channel(true))
        .unwrap();
    assert_eq!(with_sync[0].channel_count, 5);
}

#[test]
fn test_spikeglx_bind_reads_interleaved_samples() {
    let dir = TempDir::new("io_glx_bind");
    write_spikeglx_run(dir.path());

    let backend = backend_for(FormatTag::SpikeGlx);
    let options = OpenOptions::default();
    let streams = backend.list_streams(dir.path(), &options).unwrap();
    let source = backend.bind(dir.path(), &streams[0], &options).unwrap();

    assert_eq!(source.num_samples(), 10);
    assert_eq!(source.channel_ids().len(), 4);
    assert_eq!(source.annotations().get("segment_count").map(String::as_str), Some("1"));
    assert_eq!(
        source.annotations().get("start_time").map(String::as_str),
        Some("2020-06-03 13:47:57")
    );

    let traces = source.read_traces(2, 4, Some(&[0, 3])).unwrap();
    assert_eq!(traces.num_frames, 2);
    assert_eq!(traces.data, vec![20, 23, 30, 33]);

    let err = source.read_traces(0, 11, None).unwrap_err();
    assert!(matches!(err, EphysError::OutOfRange { .. }));
    let err = source.read_traces(0, 1, Some(&[4])).unwrap_err();
    assert!(matches!(err, EphysError::OutOfRange { .. }));
}

#[test]
fn test_legacy_streams_split_by_kind() {
    let dir = TempDir::new("io_legacy_kinds");
    write_legacy(
        dir.path(),
        &["100_CH1", "100_CH2", "100_AUX1", "100_ADC1"],
        &[1, 2, 3, 4],
    );

    let backend = backend_for(FormatTag::OpenEphysLegacy);
    let streams = backend
        .list_streams(dir.path(), &OpenOptions::default())
        .unwrap();
    let names: Vec<&str> = streams.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Signals CH", "Signals AUX", "Signals ADC"]);
    assert!(streams[0].is_probe());
    assert!(!streams[1].is_probe());
    assert_eq!(streams[0].channel_count, 2);

    let source = backend
        .bind(dir.path(), &streams[0], &OpenOptions::default())
        .unwrap();
    assert_eq!(source.sample_rate(), 30000.0);
    assert_eq!(source.gains(), &[0.195, 0.195]);
    let traces = source.read_traces(0, 4, None).unwrap();
    assert_eq!(traces.channel(0), vec![1, 2, 3, 4]);
    assert_eq!(traces.channel(1), vec![1, 2, 3, 4]);
}

#[test]
fn test_legacy_backend_has_no_events() {
    let dir = TempDir::new("io_legacy_events");
    write_legacy(dir.path(), &["100_CH1"], &[0]);

    let err = backend_for(FormatTag::OpenEphysLegacy)
        .bind_events(dir.path(), &OpenOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, EphysError::EventsNotSupported { .. }));
}

#[test]
fn test_binary_streams_and_annotations() {
    let dir = TempDir::new("io_binary");
    write_binary(dir.path(), false);

    let backend = backend_for(FormatTag::OpenEphysBinary);
    let options = OpenOptions::default();
    let streams = backend.list_streams(dir.path(), &options).unwrap();
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].name, "Neuropix-PXI-100.ProbeA");
    assert_eq!(streams[0].kind, StreamKind::Probe);
    assert_eq!(streams[1].kind, StreamKind::Auxiliary);

    let source = backend.bind(dir.path(), &streams[1], &options).unwrap();
    assert_eq!(source.channel_ids().len(), 2);
    assert_eq!(source.num_samples(), 6);
    let annotations = source.annotations();
    assert_eq!(annotations.get("recording_count").map(String::as_str), Some("1"));
    assert_eq!(annotations.get("gui_version").map(String::as_str), Some("0.6.4"));

    let traces = source.read_traces(5, 6, None).unwrap();
    assert_eq!(traces.data, vec![50, 51]);
}

#[test]
fn test_binary_bind_from_recording_folder() {
    let dir = TempDir::new("io_binary_rec");
    let rec = write_binary(dir.path(), false);

    let backend = backend_for(FormatTag::OpenEphysBinary);
    let streams = backend.list_streams(&rec, &OpenOptions::default()).unwrap();
    assert_eq!(streams.len(), 2);
}

#[test]
fn test_event_arrays_on_disk() {
    let dir = TempDir::new("io_npy");
    let rec = write_binary(dir.path(), false);

    let ttl = rec.join("events/Neuropix-PXI-100.ProbeA/TTL");
    let samples = read_npy(ttl.join("sample_numbers.npy")).unwrap();
    assert_eq!(samples.to_i64(), vec![30, 60, 90]);
    let states = read_npy(ttl.join("states.npy")).unwrap();
    assert_eq!(states.to_i64(), vec![1, -1, 1]);
}

// ============================================================================
// Curation
// ============================================================================

fn sorting() -> Sorting {
    let mut sorting = Sorting::new(30000.0);
    sorting.insert_unit(0, vec![10, 40, 70]);
    sorting.insert_unit(1, vec![20, 50]);
    sorting.insert_unit(2, vec![30, 60, 90, 120]);
    sorting
}

#[test]
fn test_curation_session() {
    let mut curation = CurationSorting::new(sorting());

    let merged = curation.merge(&[0, 1], None).unwrap();
    assert_eq!(merged, 3);
    assert_eq!(
        curation.sorting().spike_train(3),
        Some(&[10, 20, 40, 50, 70][..])
    );

    let parts = curation.split(2, &[0, 1, 0, 1], None).unwrap();
    assert_eq!(parts, vec![4, 5]);
    assert_eq!(curation.sorting().spike_train(4), Some(&[30, 90][..]));

    curation.remove_units(&[5]).unwrap();
    assert_eq!(curation.sorting().unit_ids(), vec![3, 4]);
    assert_eq!(curation.history().len(), 3);

    curation.undo();
    curation.undo();
    assert_eq!(curation.sorting().unit_ids(), vec![2, 3]);

    let err = curation.remove_units(&[42]).unwrap_err();
    assert!(matches!(err, EphysError::UnknownUnit { unit_id: 42 }));
    assert_eq!(curation.history().len(), 1);
}

// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Basic integration tests for the MXL crate.
//!
//! These tests exercise the core read/write operations for both discrete
//! (grain-based) and continuous (sample-based) flows. Each test creates an
//! isolated temporary domain on `/dev/shm` and cleans up automatically.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mxl::{
    DataFormat, Error, FlowManager, MxlInstance, OwnedGrainData, OwnedSamplesData, Rational,
};
use tracing::info;
use uuid::Uuid;

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

/// RAII guard for test domain directories.
struct TestDomainGuard {
    dir: PathBuf,
}

impl TestDomainGuard {
    fn new(test: &str) -> Self {
        let base = if Path::new("/dev/shm").is_dir() {
            PathBuf::from("/dev/shm")
        } else {
            std::env::temp_dir()
        };
        let dir = base.join(format!("mxl_basic_tests_domain_{}_{}", test, Uuid::new_v4()));
        std::fs::create_dir_all(&dir)
            .unwrap_or_else(|_| panic!("Failed to create test domain \"{}\".", dir.display()));
        Self { dir }
    }

    fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for TestDomainGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Initializes logging and creates an isolated MXL instance.
fn setup_test(test: &str) -> (MxlInstance, TestDomainGuard) {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });

    let domain_guard = TestDomainGuard::new(test);
    let instance = MxlInstance::new(domain_guard.path()).unwrap();
    (instance, domain_guard)
}

fn read_flow_def(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("Failed to read flow definition \"{}\".", path.display()))
}

/// Grain roundtrip through the instance facade: create a video flow from
/// its JSON definition, write a grain at the current index, read it back.
#[test]
fn basic_grain_writing_reading() {
    let (instance, _domain_guard) = setup_test("grains");
    let flow_def = read_flow_def("v210_flow.json");

    let (flow_writer, config, was_created) = instance.create_flow_writer(&flow_def, None).unwrap();
    assert!(was_created);
    assert_eq!(config.data_format(), DataFormat::Video);

    let flow_id = config.id().to_string();
    let grain_writer = flow_writer.to_grain_writer().unwrap();
    let grain_reader = instance
        .create_flow_reader(&flow_id)
        .unwrap()
        .to_grain_reader()
        .unwrap();

    let rate = config.grain_rate().unwrap();
    let current_index = instance.get_current_index(&rate);

    let mut access = grain_writer.open_grain(current_index).unwrap();
    for (i, byte) in access.payload_mut().iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    let size = access.max_size();
    access.commit(size).unwrap();

    let grain = grain_reader
        .get_complete_grain(current_index, Duration::from_secs(5))
        .unwrap();
    assert!(grain.is_complete());
    assert_eq!(grain.index, current_index);
    assert!(grain.payload.iter().enumerate().all(|(i, b)| *b == (i % 251) as u8));

    let owned: OwnedGrainData = grain.into();
    info!("Grain data len: {:?}", owned.payload.len());

    // A second writer for the same definition reuses the published flow.
    let (_, _, was_created) = instance.create_flow_writer(&flow_def, None).unwrap();
    assert!(!was_created);
}

/// Samples roundtrip through the instance facade.
#[test]
fn basic_samples_writing_reading() {
    let (instance, _domain_guard) = setup_test("samples");
    let flow_def = read_flow_def("audio_flow.json");

    let (flow_writer, config, was_created) = instance.create_flow_writer(&flow_def, None).unwrap();
    assert!(was_created);
    assert_eq!(config.data_format(), DataFormat::Audio);
    let (channel_count, word_size, _) = config.continuous().unwrap();
    assert_eq!(channel_count, 2);
    assert_eq!(word_size, 4);

    let flow_id = config.id().to_string();
    let samples_writer = flow_writer.to_samples_writer().unwrap();
    let samples_reader = instance
        .create_flow_reader(&flow_id)
        .unwrap()
        .to_samples_reader()
        .unwrap();

    let rate = config.sample_rate().unwrap();
    let start = instance.get_current_index(&rate);

    let mut access = samples_writer.open_samples(start, 42).unwrap();
    assert_eq!(access.channels(), 2);
    for ch in 0..access.channels() {
        let fill = ch as u8 + 1;
        let (frag1, frag2) = access.channel_data_mut(ch).unwrap();
        frag1.fill(fill);
        frag2.fill(fill);
    }
    access.commit().unwrap();

    let samples = samples_reader
        .get_samples(start, 42, Duration::from_secs(5))
        .unwrap();
    assert_eq!(samples.num_of_channels(), 2);
    for ch in 0..samples.num_of_channels() {
        let fill = ch as u8 + 1;
        let (frag1, frag2) = samples.channel_data(ch).unwrap();
        assert_eq!(frag1.len() + frag2.len(), 42 * 4);
        assert!(frag1.iter().chain(frag2.iter()).all(|b| *b == fill));
    }

    let owned: OwnedSamplesData = samples.into();
    info!(
        "Samples data contains {} channel(s), channel 0 has {} byte(s).",
        owned.payload.len(),
        owned.payload[0].len()
    );
    assert_eq!(owned.payload.len(), 2);
    assert_eq!(owned.payload[0].len(), 42 * 4);
}

/// The stored flow definition is returned byte-for-byte.
#[test]
fn get_flow_def() {
    let (instance, _domain_guard) = setup_test("flow_def");
    let flow_def = read_flow_def("v210_flow.json");

    let (flow_writer, config, was_created) = instance.create_flow_writer(&flow_def, None).unwrap();
    assert!(was_created);

    let retrieved = instance.get_flow_def(&config.id().to_string()).unwrap();
    assert_eq!(flow_def, retrieved);
    drop(flow_writer);

    assert!(matches!(
        instance.get_flow_def("33333333-3333-3333-3333-333333333333"),
        Err(Error::FlowNotFound)
    ));
    assert!(matches!(
        instance.get_flow_def("not-a-uuid"),
        Err(Error::InvalidArg)
    ));
}

/// Writer/reader rendezvous on a small ring: slot reuse makes older indices
/// unrecoverable.
#[test]
fn grain_ring_overwrite_semantics() {
    let (instance, domain_guard) = setup_test("ring_overwrite");
    let manager = FlowManager::new(domain_guard.path()).unwrap();
    let flow_id = Uuid::parse_str("77777777-7777-7777-7777-777777777777").unwrap();

    let created = manager
        .create_discrete_flow(flow_id, "{}", DataFormat::Video, 10, Rational::new(60, 1), 256)
        .unwrap();
    drop(created);

    let grain_writer = instance
        .open_flow_writer(&flow_id.to_string())
        .unwrap()
        .to_grain_writer()
        .unwrap();
    let grain_reader = instance
        .create_flow_reader(&flow_id.to_string())
        .unwrap()
        .to_grain_reader()
        .unwrap();

    // Commit index 100 into slot 0.
    let mut access = grain_writer.open_grain(100).unwrap();
    access.payload_mut().fill(0xAB);
    access.commit(256).unwrap();

    let grain = grain_reader
        .get_grain(100, Duration::from_secs(1))
        .unwrap();
    assert!(grain.payload.iter().all(|b| *b == 0xAB));
    assert_eq!(grain.total_size, 256);

    // Index 90 maps to the same slot, which now holds 100.
    assert!(matches!(
        grain_reader.get_grain(90, Duration::ZERO),
        Err(Error::OutOfRangeTooLate)
    ));

    // Index 105 maps to an empty slot: nothing to read yet.
    assert!(matches!(
        grain_reader.get_grain(105, Duration::ZERO),
        Err(Error::Timeout)
    ));
    assert!(matches!(
        grain_reader.get_grain_non_blocking(105),
        Err(Error::OutOfRangeTooEarly)
    ));

    // Reopening the resident index is a duplicate; regressing is too late.
    assert!(matches!(
        grain_writer.open_grain(100),
        Err(Error::Conflict)
    ));
    assert!(matches!(
        grain_writer.open_grain(90),
        Err(Error::OutOfRangeTooLate)
    ));

    // A canceled session returns its slot to the empty state.
    let access = grain_writer.open_grain(95).unwrap();
    access.cancel();
    assert!(matches!(
        grain_reader.get_grain_non_blocking(95),
        Err(Error::OutOfRangeTooEarly)
    ));
    let access = grain_writer.open_grain(95).unwrap();
    access.commit(256).unwrap();
    assert!(grain_reader.get_grain(95, Duration::ZERO).is_ok());

    // The head tracks the highest committed index.
    assert_eq!(grain_reader.get_runtime_info().head_index, 100);
}

/// Partial commits publish a growing prefix before the grain completes.
#[test]
fn partial_grain_visibility() {
    let (instance, domain_guard) = setup_test("partial_grains");
    let manager = FlowManager::new(domain_guard.path()).unwrap();
    let flow_id = Uuid::parse_str("88888888-8888-8888-8888-888888888888").unwrap();

    manager
        .create_discrete_flow(flow_id, "{}", DataFormat::Video, 4, Rational::new(50, 1), 512)
        .unwrap();

    let grain_writer = instance
        .open_flow_writer(&flow_id.to_string())
        .unwrap()
        .to_grain_writer()
        .unwrap();
    let grain_reader = instance
        .create_flow_reader(&flow_id.to_string())
        .unwrap()
        .to_grain_reader()
        .unwrap();

    let mut access = grain_writer.open_grain(200).unwrap();
    access.payload_mut()[..128].fill(0x11);
    access.commit_partial(128).unwrap();

    // Readers see the committed prefix immediately.
    let partial = grain_reader.get_grain(200, Duration::ZERO).unwrap();
    assert_eq!(partial.payload.len(), 128);
    assert_eq!(partial.total_size, 512);
    assert!(!partial.is_complete());

    // A complete-grain read keeps waiting for the rest.
    assert!(matches!(
        grain_reader.get_complete_grain(200, Duration::from_millis(20)),
        Err(Error::Timeout)
    ));

    // The committed prefix can only grow.
    assert!(matches!(access.commit_partial(64), Err(Error::InvalidArg)));

    access.payload_mut()[128..].fill(0x22);
    access.commit(512).unwrap();

    let complete = grain_reader
        .get_complete_grain(200, Duration::from_secs(1))
        .unwrap();
    assert!(complete.is_complete());
    assert!(complete.payload[..128].iter().all(|b| *b == 0x11));
    assert!(complete.payload[128..].iter().all(|b| *b == 0x22));

    // Dropping a session after a partial commit keeps the published bytes:
    // readers may already have observed them.
    {
        let mut access = grain_writer.open_grain(201).unwrap();
        access.payload_mut()[..32].fill(0x33);
        access.commit_partial(32).unwrap();
    }
    let survived = grain_reader.get_grain(201, Duration::ZERO).unwrap();
    assert_eq!(survived.payload.len(), 32);
    assert!(survived.payload.iter().all(|b| *b == 0x33));

    // Dropping a session that never published cancels the slot.
    {
        let mut access = grain_writer.open_grain(202).unwrap();
        access.payload_mut().fill(0x44);
    }
    assert!(matches!(
        grain_reader.get_grain_non_blocking(202),
        Err(Error::OutOfRangeTooEarly)
    ));
}

/// A blocking reader in one thread observes a commit made in another.
#[test]
fn blocking_reader_rendezvous() {
    let (instance, domain_guard) = setup_test("blocking_rendezvous");
    let manager = FlowManager::new(domain_guard.path()).unwrap();
    let flow_id = Uuid::parse_str("99999999-9999-9999-9999-999999999999").unwrap();

    manager
        .create_discrete_flow(flow_id, "{}", DataFormat::Video, 8, Rational::new(60, 1), 128)
        .unwrap();

    let grain_writer = instance
        .open_flow_writer(&flow_id.to_string())
        .unwrap()
        .to_grain_writer()
        .unwrap();
    let grain_reader = instance
        .create_flow_reader(&flow_id.to_string())
        .unwrap()
        .to_grain_reader()
        .unwrap();

    let writer_thread = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        let mut access = grain_writer.open_grain(4242).unwrap();
        access.payload_mut().fill(0x5A);
        access.commit(128).unwrap();
    });

    let grain = grain_reader
        .get_complete_grain(4242, Duration::from_secs(2))
        .unwrap();
    assert!(grain.payload.iter().all(|b| *b == 0x5A));

    writer_thread.join().unwrap();
}

/// Sample ranges crossing the ring boundary split into two fragments; old
/// ranges fall out of the ring.
#[test]
fn sample_ring_wrap_and_ranges() {
    let (instance, domain_guard) = setup_test("sample_wrap");
    let manager = FlowManager::new(domain_guard.path()).unwrap();
    let flow_id = Uuid::parse_str("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa").unwrap();

    manager
        .create_continuous_flow(
            flow_id,
            "{}",
            DataFormat::Audio,
            Rational::new(48000, 1),
            2,
            4,
            64,
        )
        .unwrap();

    let samples_writer = instance
        .open_flow_writer(&flow_id.to_string())
        .unwrap()
        .to_samples_writer()
        .unwrap();
    let samples_reader = instance
        .create_flow_reader(&flow_id.to_string())
        .unwrap()
        .to_samples_reader()
        .unwrap();

    // [60, 76) wraps a 64-sample ring: 4 samples at the end, 12 at the
    // front.
    let mut access = samples_writer.open_samples(60, 16).unwrap();
    for ch in 0..access.channels() {
        let (frag1, frag2) = access.channel_data_mut(ch).unwrap();
        assert_eq!(frag1.len(), 4 * 4);
        assert_eq!(frag2.len(), 12 * 4);
        frag1.fill(0xC0 + ch as u8);
        frag2.fill(0xC0 + ch as u8);
    }
    access.commit().unwrap();

    assert_eq!(samples_reader.head_index(0).unwrap(), 76);
    assert_eq!(samples_reader.head_index(1).unwrap(), 76);
    assert_eq!(samples_reader.get_runtime_info().head_index, 75);

    let samples = samples_reader
        .get_samples(60, 16, Duration::from_secs(1))
        .unwrap();
    for ch in 0..samples.num_of_channels() {
        let (frag1, frag2) = samples.channel_data(ch).unwrap();
        assert_eq!(frag1.len(), 4 * 4);
        assert_eq!(frag2.len(), 12 * 4);
        assert!(frag1.iter().chain(frag2.iter()).all(|b| *b == 0xC0 + ch as u8));
    }

    // The floats view lines up with the raw bytes.
    let (frag1, _) = samples.channel_data(0).unwrap();
    let as_f32: &[f32] = bytemuck::cast_slice(frag1);
    assert_eq!(as_f32.len(), 4);

    // Sample 11 has been overwritten (oldest resident is 76 - 64 = 12).
    assert!(matches!(
        samples_reader.get_samples(11, 1, Duration::ZERO),
        Err(Error::OutOfRangeTooLate)
    ));

    // A future range is too early without blocking, a timeout with.
    assert!(matches!(
        samples_reader.get_samples_non_blocking(80, 8),
        Err(Error::OutOfRangeTooEarly)
    ));
    assert!(matches!(
        samples_reader.get_samples(80, 8, Duration::from_millis(20)),
        Err(Error::Timeout)
    ));

    // Bad ranges are invalid arguments.
    assert!(matches!(
        samples_reader.get_samples(60, 0, Duration::ZERO),
        Err(Error::InvalidArg)
    ));
    assert!(matches!(
        samples_reader.get_samples(60, 65, Duration::ZERO),
        Err(Error::InvalidArg)
    ));
    assert!(matches!(
        samples_reader.head_index(2),
        Err(Error::InvalidArg)
    ));
}

/// Per-channel writes advance only their channel's head; batch reads wait
/// for every channel.
#[test]
fn per_channel_writes() {
    let (instance, domain_guard) = setup_test("per_channel");
    let manager = FlowManager::new(domain_guard.path()).unwrap();
    let flow_id = Uuid::parse_str("bbbbbbbb-bbbb-bbbb-bbbb-bbbbbbbbbbbb").unwrap();

    manager
        .create_continuous_flow(
            flow_id,
            "{}",
            DataFormat::Audio,
            Rational::new(48000, 1),
            2,
            4,
            128,
        )
        .unwrap();

    let samples_writer = instance
        .open_flow_writer(&flow_id.to_string())
        .unwrap()
        .to_samples_writer()
        .unwrap();
    let samples_reader = instance
        .create_flow_reader(&flow_id.to_string())
        .unwrap()
        .to_samples_reader()
        .unwrap();

    let data = vec![0x7Fu8; 8 * 4];
    samples_writer.write_channel(0, 1000, &data).unwrap();

    assert_eq!(samples_reader.head_index(0).unwrap(), 1008);
    assert_eq!(samples_reader.head_index(1).unwrap(), 0);

    // The batch read spans all channels; channel 1 has nothing yet.
    assert!(matches!(
        samples_reader.get_samples(1000, 8, Duration::from_millis(20)),
        Err(Error::Timeout)
    ));

    samples_writer.write_channel(1, 1000, &data).unwrap();
    let samples = samples_reader
        .get_samples(1000, 8, Duration::from_secs(1))
        .unwrap();
    let (frag1, frag2) = samples.channel_data(1).unwrap();
    assert_eq!(frag1.len() + frag2.len(), 8 * 4);

    // Unknown channels and misaligned byte lengths are invalid.
    assert!(matches!(
        samples_writer.write_channel(2, 1000, &data),
        Err(Error::InvalidArg)
    ));
    assert!(matches!(
        samples_writer.write_channel(0, 1000, &data[..7]),
        Err(Error::InvalidArg)
    ));
}

/// The flow definition schema parses the NMOS documents used by the tests.
#[test]
fn flow_def_schema() {
    use mxl::flowdef::{FlowDef, FlowDefDetails};

    let video: FlowDef = serde_json::from_str(&read_flow_def("v210_flow.json")).unwrap();
    assert_eq!(
        video.id,
        Uuid::parse_str("5fbec3b1-1b0f-417d-9059-8b94a47197ed").unwrap()
    );
    let FlowDefDetails::Video(details) = &video.details else {
        panic!("expected a video definition");
    };
    assert_eq!(details.grain_rate, Rational::new(60000, 1001));
    assert_eq!(details.components.len(), 3);

    let audio: FlowDef = serde_json::from_str(&read_flow_def("audio_flow.json")).unwrap();
    let FlowDefDetails::Audio(details) = &audio.details else {
        panic!("expected an audio definition");
    };
    assert_eq!(details.sample_rate, Rational::new(48000, 1));
    assert_eq!(details.channel_count, 2);

    // A rate without a denominator defaults to 1.
    let rate: Rational = serde_json::from_str(r#"{"numerator": 50}"#).unwrap();
    assert_eq!(rate, Rational::new(50, 1));
}

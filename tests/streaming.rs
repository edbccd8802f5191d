use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;

use autolabel::{
    PixelFormat, ResolvedInput, Resolver, ScreenshotSource, SourceConfig, SourceError,
    StreamSource, StreamState, SyntheticCapture, VideoFileSource, VideoStreamSource,
};

fn resolve(config: &SourceConfig, descriptor: &str) -> ResolvedInput {
    Resolver::new(config).resolve(descriptor).expect("resolve")
}

fn video_input(root: &Path, config: &SourceConfig) -> ResolvedInput {
    let clip = root.join("clip.mp4");
    std::fs::write(&clip, b"synthetic clip").unwrap();
    resolve(config, clip.to_str().unwrap())
}

fn video(
    root: &Path,
    config: &SourceConfig,
    interval: i64,
    device: SyntheticCapture,
) -> VideoFileSource {
    VideoFileSource::with_device(video_input(root, config), interval, config, Box::new(device))
        .expect("open video")
}

#[test]
fn video_slice_steps_by_interval() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    // 10 fps, so one second covers ten frames.
    let mut source = video(root.path(), &config, 2, SyntheticCapture::clip(30, 10, 4, 4));

    let frames = source.slice(Duration::from_secs(1), false).unwrap();
    let stamps: Vec<u128> = frames.iter().map(|f| f.timestamp().as_millis()).collect();
    assert_eq!(stamps, vec![0, 200, 400, 600, 800]);
    assert!(!config.capture_dir.exists());

    // The next window continues where the last one stopped.
    let next = source.slice(Duration::from_secs(1), false).unwrap();
    assert_eq!(next.first().map(|f| f.timestamp().as_millis()), Some(1000));
}

#[test]
fn changing_interval_alters_slice_step() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let mut source = video(root.path(), &config, 2, SyntheticCapture::clip(30, 10, 4, 4));
    assert_eq!(source.slice(Duration::from_secs(1), false).unwrap().len(), 5);

    for bad in [0, -4] {
        assert!(matches!(
            source.set_interval(bad),
            Err(SourceError::InvalidInterval(v)) if v == bad
        ));
    }
    assert_eq!(source.interval().get(), 2);

    source.set_interval(5).unwrap();
    let stamps: Vec<u128> = source
        .slice(Duration::from_secs(1), false)
        .unwrap()
        .iter()
        .map(|f| f.timestamp().as_millis())
        .collect();
    assert_eq!(stamps, vec![1000, 1500]);
}

#[test]
fn live_sources_reject_non_positive_interval_changes() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let mut stream = VideoStreamSource::with_device(
        resolve(&config, "rtsp://127.0.0.1/cam"),
        100,
        &config,
        Box::new(SyntheticCapture::live(2, 2)),
    )
    .unwrap();
    let mut screen = ScreenshotSource::with_device(
        resolve(&config, "screen:0"),
        100,
        &config,
        Box::new(SyntheticCapture::live(2, 2)),
    )
    .unwrap();

    let sources: [&mut dyn StreamSource; 2] = [&mut stream, &mut screen];
    for source in sources {
        assert!(matches!(
            source.set_interval(0),
            Err(SourceError::InvalidInterval(0))
        ));
        assert!(matches!(
            source.set_interval(-1),
            Err(SourceError::InvalidInterval(-1))
        ));
        assert_eq!(source.interval().get(), 100);
        source.set_interval(25).unwrap();
        assert_eq!(source.interval().get(), 25);
    }
}

#[test]
fn video_slice_with_save_writes_one_file_per_frame() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let mut source = video(root.path(), &config, 2, SyntheticCapture::clip(30, 10, 8, 8));

    let frames = source.slice(Duration::from_secs(1), true).unwrap();
    assert_eq!(frames.len(), 5);

    let mut saved: Vec<String> = std::fs::read_dir(&config.capture_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    saved.sort();
    assert_eq!(
        saved,
        vec!["0.jpg", "200.jpg", "400.jpg", "600.jpg", "800.jpg"]
    );
}

#[test]
fn video_slice_stops_at_end_of_clip() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let mut source = video(root.path(), &config, 1, SyntheticCapture::clip(3, 10, 4, 4));

    let frames = source.slice(Duration::from_secs(5), false).unwrap();
    assert_eq!(frames.len(), 3);
    assert!(matches!(source.capture(), Err(SourceError::EndOfStream)));
    assert_eq!(source.state(), StreamState::Exhausted);
}

#[test]
fn continuous_iteration_ends_at_end_of_stream() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let mut source = video(root.path(), &config, 2, SyntheticCapture::clip(9, 10, 4, 4));

    let stamps: Vec<u128> = source
        .frames()
        .map(|frame| frame.unwrap().timestamp().as_millis())
        .collect();
    assert_eq!(stamps, vec![0, 200, 400, 600, 800]);
    assert_eq!(source.state(), StreamState::Exhausted);
    assert_eq!(source.stats().frames_captured, 5);
}

#[test]
fn continuous_iteration_yields_read_error_once() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let device = SyntheticCapture::live(4, 4).failing_after(2);
    let mut source = VideoStreamSource::with_device(
        resolve(&config, "rtsp://127.0.0.1/cam"),
        1,
        &config,
        Box::new(device),
    )
    .unwrap();

    let results: Vec<_> = source.frames().collect();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok() && results[1].is_ok());
    assert!(matches!(results[2], Err(SourceError::ReadFailure(_))));

    // The source is still usable for cleanup.
    assert_eq!(source.state(), StreamState::Open);
    source.release();
    assert_eq!(source.state(), StreamState::Closed);
}

#[test]
fn release_is_idempotent_and_closes_capture() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let device = SyntheticCapture::clip(10, 10, 4, 4);
    let releases = device.release_counter();
    let mut source = video(root.path(), &config, 1, device);

    assert!(source.capture().is_ok());
    source.release();
    source.release();

    assert!(matches!(source.capture(), Err(SourceError::Closed)));
    assert!(matches!(
        source.slice(Duration::from_secs(1), false),
        Err(SourceError::Closed)
    ));
    drop(source);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[test]
fn error_path_releases_exactly_once() {
    fn capture_too_many(source: &mut dyn StreamSource) -> autolabel::Result<()> {
        for _ in 0..10 {
            source.capture()?;
        }
        Ok(())
    }

    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let device = SyntheticCapture::live(4, 4).failing_after(3);
    let releases = device.release_counter();

    let outcome = {
        let mut source = ScreenshotSource::with_device(
            resolve(&config, "screen:1"),
            10,
            &config,
            Box::new(device),
        )
        .unwrap();
        assert_eq!(source.monitor(), 1);
        capture_too_many(&mut source)
    };

    assert!(matches!(outcome, Err(SourceError::ReadFailure(_))));
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[test]
fn live_slice_is_bounded_by_wall_clock() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let mut source = VideoStreamSource::with_device(
        resolve(&config, "rtmp://127.0.0.1/live/cam"),
        50,
        &config,
        Box::new(SyntheticCapture::live(4, 4)),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let frames = source.slice(Duration::from_millis(200), false).unwrap();
    let elapsed = started.elapsed();

    assert!((2..=5).contains(&frames.len()), "got {} frames", frames.len());
    assert!(elapsed >= Duration::from_millis(150));
    assert!(frames
        .windows(2)
        .all(|pair| pair[0].timestamp() <= pair[1].timestamp()));
}

#[test]
fn screen_grabs_in_bgrx_arrive_as_rgb() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let mut source = ScreenshotSource::with_device(
        resolve(&config, "screen:0"),
        10,
        &config,
        Box::new(SyntheticCapture::live(4, 2).with_format(PixelFormat::Bgra32)),
    )
    .unwrap();

    let frame = source.capture().unwrap();
    assert_eq!((frame.width, frame.height), (4, 2));
    assert_eq!(frame.byte_len(), 4 * 2 * 3);
    assert_eq!(&frame.pixels()[..3], &[2, 1, 0]);
}

#[test]
fn live_slice_aborts_on_read_failure() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());
    let mut source = ScreenshotSource::with_device(
        resolve(&config, "screen:0"),
        10,
        &config,
        Box::new(SyntheticCapture::live(4, 4).failing_after(1)),
    )
    .unwrap();

    assert!(matches!(
        source.slice(Duration::from_millis(200), false),
        Err(SourceError::ReadFailure(_))
    ));
}

#[test]
fn non_positive_interval_is_rejected_for_every_stream() {
    let root = tempfile::tempdir().unwrap();
    let config = SourceConfig::isolated(root.path());

    for interval in [0, -1] {
        let video = VideoFileSource::with_device(
            video_input(root.path(), &config),
            interval,
            &config,
            Box::new(SyntheticCapture::clip(1, 10, 2, 2)),
        );
        assert!(matches!(video, Err(SourceError::InvalidInterval(v)) if v == interval));

        let stream = VideoStreamSource::open(
            resolve(&config, "rtsp://127.0.0.1/cam"),
            interval,
            &config,
        );
        assert!(matches!(stream, Err(SourceError::InvalidInterval(v)) if v == interval));

        let screen = ScreenshotSource::open(resolve(&config, "screen:0"), interval, &config);
        assert!(matches!(screen, Err(SourceError::InvalidInterval(v)) if v == interval));
    }
}

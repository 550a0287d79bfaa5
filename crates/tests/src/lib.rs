//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 -> 同步器 -> 拉取 的完整流程
//! - 合成源 / 图像序列源 e2e（无需真实视频）
//! - 跟踪器 + 对齐器的跨 crate 行为

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        AlignedFrameSet, DecodedFrame, FrameSource, Rect, RoiSnapshot, StopReason, SyncStatus,
        SynchronizerConfig, TrackerConfig,
    };
    use ingestion::{open_source, SourceStream, SyntheticConfig, SyntheticSource};
    use observability::SyncMetricsAggregator;
    use region_tracker::RegionTracker;
    use sync_engine::{Aligner, AlignerConfig, DebugFragments, FrameSynchronizer, TickOutcome};

    fn fast_tracker() -> TrackerConfig {
        TrackerConfig {
            low_threshold: 2,
            high_threshold: 4,
            warmup_frames: 2,
            blur_sigma: 0.0,
            ..Default::default()
        }
    }

    /// Pull until the synchronizer stops or `timeout` passes
    fn drain(sync: &FrameSynchronizer, timeout: Duration) -> Vec<AlignedFrameSet> {
        let deadline = Instant::now() + timeout;
        let mut sets = Vec::new();
        while Instant::now() < deadline {
            match sync.read() {
                Some(set) => sets.push(set),
                None if sync.is_stopped() => break,
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        sets
    }

    /// Feed an opened source through the worker-side steps by hand: decode, track, buffer
    fn capture(
        source: &mut dyn FrameSource,
        stream: &SourceStream,
        mut tracker: Option<&mut RegionTracker>,
        frames: usize,
    ) {
        for _ in 0..frames {
            let image = source.read_frame().unwrap().unwrap();
            if let Some(tracker) = tracker.as_deref_mut() {
                stream.publish_roi(tracker.process(&image));
            }
            let seq = stream.metrics().captured;
            stream.push(Arc::new(DecodedFrame::new(stream.index(), seq, image)));
        }
    }

    /// Config file -> FrameSynchronizer -> pull until both sources end
    #[test]
    fn test_e2e_config_to_end_of_stream() {
        let content = r#"
sources = [
    "synthetic:fps=500,frames=60",
    "synthetic:fps=500,frames=60",
]
poll_interval_ms = 1

[tracker]
low_threshold = 2
high_threshold = 4
warmup_frames = 2
"#;
        let config = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        let sync = FrameSynchronizer::new(config).unwrap();
        sync.start().unwrap();

        let sets = drain(&sync, Duration::from_secs(20));
        sync.join();

        assert!(sync.is_stopped());
        assert!(sync.failure().is_none());
        assert!(sync
            .source_stats()
            .iter()
            .any(|s| s.stop_reason == Some(StopReason::EndOfStream)));

        // Every tuple has one frame per source; per-source order is FIFO
        let mut last: Vec<Option<u64>> = vec![None; 2];
        for set in &sets {
            assert_eq!(set.frames.len(), 2);
            for (source, seq) in set.seqs().into_iter().enumerate() {
                assert_eq!(set.frames[source].source, source);
                if let Some(prev) = last[source] {
                    assert!(seq > prev, "source {source}: {seq} after {prev}");
                }
                last[source] = Some(seq);
            }
        }

        // Set ids increase strictly
        assert!(sets.windows(2).all(|w| w[0].set_id < w[1].set_id));
    }

    /// Captured frames run through the tracker until the ROI is trusted
    #[test]
    fn test_tracker_stabilizes_on_synthetic_motion() {
        let mut source = SyntheticSource::new("cam", SyntheticConfig::default());
        source.open().unwrap();
        let stream = SourceStream::new(0, "cam", 64);
        let mut tracker = RegionTracker::new(fast_tracker());

        capture(&mut source, &stream, Some(&mut tracker), 3);
        assert!(!stream.roi().is_usable(), "no detection during warm-up");

        capture(&mut source, &stream, Some(&mut tracker), 20);
        let roi = stream.roi();
        assert!(roi.is_usable(), "roi = {roi:?}");
        assert_eq!(roi.generation, 23);
        let clipped = roi.rect.clip_to(64, 48).unwrap();
        assert!(clipped.w > 0 && clipped.h > 0);
    }

    /// A source leading by five frames is trimmed on the reference side, then stays aligned
    #[test]
    fn test_e2e_drift_correction() {
        const FULL: Rect = Rect {
            x: 0,
            y: 0,
            w: 64,
            h: 48,
        };

        let mut reference = open_source("synthetic").unwrap();
        let mut leading = open_source("synthetic:lead=5").unwrap();
        let streams = vec![
            Arc::new(SourceStream::new(0, reference.name(), 128)),
            Arc::new(SourceStream::new(1, leading.name(), 128)),
        ];
        reference.open().unwrap();
        capture(reference.as_mut(), &streams[0], None, 30);
        leading.open().unwrap();
        capture(leading.as_mut(), &streams[1], None, 30);
        for stream in &streams {
            stream.publish_roi(RoiSnapshot::fixed(FULL));
        }

        let mut aligner = Aligner::new(
            AlignerConfig::default(),
            2,
            Arc::new(DebugFragments::new()),
        );
        let mut metrics = SyncMetricsAggregator::new();
        let mut sets = Vec::new();
        while let TickOutcome::Emitted(set) = aligner.tick(&streams).unwrap() {
            metrics.update(&set);
            sets.push(set);
        }

        assert_eq!(
            sets[0].status,
            SyncStatus::Resynchronized {
                source: 0,
                discarded: 5
            }
        );
        assert_eq!(sets[0].seqs(), vec![5, 0]);
        assert!(sets[1..].iter().all(|s| s.status == SyncStatus::Aligned));

        // 30 frames per side, 5 discarded from the reference
        assert_eq!(sets.len(), 25);
        let summary = metrics.summary();
        assert_eq!(summary.total_discarded, 5);
        assert_eq!(summary.aligned, 24);
        assert_eq!(summary.distortion.max, 0.0);
    }

    /// A manual delay on the lagging side fixes a drift below `min_shift`
    #[test]
    fn test_e2e_manual_delay() {
        const FULL: Rect = Rect {
            x: 0,
            y: 0,
            w: 64,
            h: 48,
        };
        let mut reference = open_source("synthetic:lead=2").unwrap();
        let mut other = open_source("synthetic").unwrap();
        let streams = vec![
            Arc::new(SourceStream::new(0, "ref", 128)),
            Arc::new(SourceStream::new(1, "other", 128)),
        ];
        reference.open().unwrap();
        capture(reference.as_mut(), &streams[0], None, 10);
        other.open().unwrap();
        capture(other.as_mut(), &streams[1], None, 10);
        for stream in &streams {
            stream.publish_roi(RoiSnapshot::fixed(FULL));
        }

        streams[1].request_delay(2);
        let mut aligner = Aligner::new(
            AlignerConfig::default(),
            2,
            Arc::new(DebugFragments::new()),
        );
        let TickOutcome::Emitted(set) = aligner.tick(&streams).unwrap() else {
            panic!("expected emission");
        };
        assert_eq!(set.status, SyncStatus::Aligned);
        assert_eq!(set.seqs(), vec![0, 2]);
        assert_eq!(streams[1].metrics().discarded, 2);
    }

    /// Image sequence sources on disk, one of them missing
    #[test]
    fn test_e2e_image_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let visual = dir.path().join("visual");
        std::fs::create_dir(&visual).unwrap();
        let config = SyntheticConfig::default();
        for t in 0..12u64 {
            SyntheticSource::render(&config, t)
                .save(visual.join(format!("{t:04}.png")))
                .unwrap();
        }

        let mut source = open_source(&format!("dir:{}", visual.display())).unwrap();
        let info = source.open().unwrap();
        assert_eq!((info.width, info.height), (64, 48));
        let mut count = 0;
        while let Some(image) = source.read_frame().unwrap() {
            assert_eq!(image, SyntheticSource::render(&config, count));
            count += 1;
        }
        assert_eq!(count, 12);

        let mut sync_config = SynchronizerConfig::with_sources([
            format!("dir:{}", visual.display()),
            format!("dir:{}", dir.path().join("thermal").display()),
        ]);
        sync_config.poll_interval_ms = 1;
        let sync = FrameSynchronizer::new(sync_config).unwrap();
        sync.start().unwrap();
        drain(&sync, Duration::from_secs(20));
        sync.join();

        let failure = sync.failure().unwrap();
        assert!(failure.contains("thermal"), "{failure}");
        let stats = sync.source_stats();
        assert!(matches!(stats[1].stop_reason, Some(StopReason::OpenFailed(_))));
    }

    /// Status counts over a threaded run add up to the sets pulled
    #[test]
    fn test_e2e_status_accounting() {
        let mut config = SynchronizerConfig::with_sources([
            "synthetic:fps=500,frames=80",
            "synthetic:fps=500,frames=80,lead=3",
            "synthetic:fps=500,frames=80",
        ]);
        config.poll_interval_ms = 1;
        config.tracker = fast_tracker();

        let sync = FrameSynchronizer::new(config).unwrap();
        sync.start().unwrap();
        let sets = drain(&sync, Duration::from_secs(20));
        sync.join();

        let mut metrics = SyncMetricsAggregator::new();
        let mut by_status: HashMap<&'static str, u64> = HashMap::new();
        for set in &sets {
            assert_eq!(set.frames.len(), 3);
            assert_eq!(set.distortion.len(), 2);
            metrics.update(set);
            *by_status.entry(set.status.label()).or_default() += 1;
        }

        let summary = metrics.summary();
        assert_eq!(summary.total_sets, sets.len() as u64);
        assert_eq!(
            summary.aligned + summary.resynchronized + summary.unsynchronized,
            summary.total_sets
        );
        assert_eq!(
            by_status.values().sum::<u64>(),
            summary.total_sets
        );
        assert!(sync.failure().is_none());
    }
}

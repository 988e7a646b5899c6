//! Property tests for progress accounting
//!
//! Whatever the tree shape, concurrency and failures, a finished run reports
//! progress that never goes backwards and ends exactly at the total.

mod common;

use common::*;
use proptest::prelude::*;
use ziplift::{EntryTree, ErrorKind, ExtractionOutcome, TransferError};

#[derive(Debug, Clone)]
struct FileSpec {
    dir: usize,
    compressed: u64,
    uncompressed: u64,
    fails: Option<bool>,
}

fn file_spec(dirs: usize) -> impl Strategy<Value = FileSpec> {
    (
        0..dirs,
        0u64..5_000,
        0u64..20_000,
        prop_oneof![4 => Just(None), 1 => any::<bool>().prop_map(Some)],
    )
        .prop_map(|(dir, compressed, uncompressed, fails)| FileSpec {
            dir,
            compressed,
            uncompressed,
            fails,
        })
}

fn scenario() -> impl Strategy<Value = (usize, Vec<FileSpec>, usize, bool)> {
    (1usize..4).prop_flat_map(|dirs| {
        (
            Just(dirs),
            prop::collection::vec(file_spec(dirs), 0..12),
            1usize..4,
            any::<bool>(),
        )
    })
}

fn run(dirs: usize, files: &[FileSpec], workers: usize, fail_dir: bool) {
    let mut tree = EntryTree::new("bundle");
    for dir in 0..dirs {
        tree.add_directory(&format!("d{}", dir)).unwrap();
    }
    let transport = MockTransport::default();
    if fail_dir {
        transport.fail_folder("d0", TransferError::failed(ErrorKind::Network, "reset"));
    }
    let mut failing = Vec::new();
    for (i, spec) in files.iter().enumerate() {
        let name = format!("f{}.bin", i);
        let path = format!("d{}/{}", spec.dir, name);
        tree.add_file(&path, member(spec.compressed, spec.uncompressed))
            .unwrap();
        match spec.fails {
            Some(true) => transport.fail_blob(&name, TransferError::failed(ErrorKind::Server, "503")),
            Some(false) => failing.push(path),
            None => {}
        }
    }

    let mut h = Harness::with_transport(tree, select_all(), workers, transport);
    for path in &failing {
        h.decompressor.fail(path);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let outcome = runtime.block_on(h.session.execute(false)).unwrap();

    assert_eq!(outcome, ExtractionOutcome::Complete);
    assert_eq!(h.session.progress(), h.session.total_size());
    assert_eq!(h.observer.complete_count(), 1);
    let progress = h.observer.progress();
    assert_monotonic(&progress);
    for (current, total) in &progress {
        assert!(current <= total);
    }

    let tree = h.session.tree().unwrap();
    for entry in tree.entries() {
        assert!(entry.state().is_terminal(), "{} is {}", entry.path(), entry.state());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_progress_ends_at_total((dirs, files, workers, fail_dir) in scenario()) {
        run(dirs, &files, workers, fail_dir);
    }
}

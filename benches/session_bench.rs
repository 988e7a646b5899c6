use async_trait::async_trait;
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use ziplift::error::DecompressError;
use ziplift::{
    ArchiveMember, CancellationToken, Collaborators, Decompressor, EntryTree, ProgressSink,
    RemoteFile, RemoteFolder, Session, SessionConfig, TransferError, Transport,
};

/// Accepts everything instantly, reporting progress in two steps
struct InstantStore;

#[async_trait]
impl Transport for InstantStore {
    async fn insert_folder(
        &self,
        name: &str,
        parent_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<RemoteFolder, TransferError> {
        let id = format!("{}/{}", parent_id, name);
        Ok(RemoteFolder {
            link: id.clone(),
            id,
            name: name.to_string(),
        })
    }

    async fn insert_blob(
        &self,
        blob: Bytes,
        name: &str,
        parent_id: &str,
        progress: ProgressSink,
        _cancel: &CancellationToken,
    ) -> Result<RemoteFile, TransferError> {
        let total = blob.len() as u64;
        progress.report(total / 2, total);
        progress.report(total, total);
        let id = format!("{}/{}", parent_id, name);
        Ok(RemoteFile {
            link: id.clone(),
            id,
            name: name.to_string(),
            icon_link: None,
            parents: vec![parent_id.to_string()],
        })
    }

    fn abort_all_requests(&self) {}
}

struct EmptyDecompressor;

#[async_trait]
impl Decompressor for EmptyDecompressor {
    async fn extract(
        &self,
        _path: &str,
        member: &ArchiveMember,
        progress: ProgressSink,
        _verify_checksum: bool,
    ) -> Result<Bytes, DecompressError> {
        progress.report(member.compressed_size, member.compressed_size);
        Ok(Bytes::new())
    }
}

/// `dirs` folders of `files_per_dir` files each
fn make_tree(dirs: usize, files_per_dir: usize) -> EntryTree {
    let mut tree = EntryTree::new("bench");
    for d in 0..dirs {
        for f in 0..files_per_dir {
            let member = ArchiveMember {
                index: d * files_per_dir + f,
                compressed_size: 512,
                uncompressed_size: 2048,
                crc32: 0,
            };
            tree.add_file(&format!("dir{}/file{}.dat", d, f), member)
                .unwrap();
        }
    }
    tree
}

fn bench_tree_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");

    for files in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(files), files, |b, &files| {
            b.iter(|| black_box(make_tree(files / 50, 50)));
        });
    }

    group.finish();
}

fn bench_session_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_run");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    for files in [100, 1000, 5000].iter() {
        for workers in [1, 4, 16] {
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{}", workers), files),
                files,
                |b, &files| {
                    b.iter(|| {
                        let collaborators =
                            Collaborators::new(Arc::new(InstantStore), Arc::new(EmptyDecompressor));
                        let config = SessionConfig {
                            workers,
                            ..SessionConfig::default()
                        };
                        let mut session =
                            Session::new(make_tree(files / 50, 50), "", collaborators, config);
                        let outcome = runtime.block_on(session.execute(false)).unwrap();
                        black_box(outcome)
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_tree_build, bench_session_run);
criterion_main!(benches);

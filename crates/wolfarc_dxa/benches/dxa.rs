use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn sample_text(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut i = 0u32;
    while out.len() < len {
        out.extend_from_slice(format!("event {:05} triggers map {:03}\n", i, i % 640).as_bytes());
        i += 1;
    }
    out.truncate(len);
    out
}

pub mod codec {
    use divan::Bencher;

    use super::sample_text;

    #[divan::bench]
    fn compress(bencher: Bencher) {
        bencher
            .with_inputs(|| sample_text(256 * 1024))
            .bench_refs(|data| divan::black_box(wolfarc_dxa::lzss::compress(data)));
    }

    #[divan::bench]
    fn decompress(bencher: Bencher) {
        bencher
            .with_inputs(|| wolfarc_dxa::lzss::compress(&sample_text(256 * 1024)))
            .bench_refs(|blob| divan::black_box(wolfarc_dxa::lzss::decompress(blob).unwrap()));
    }

    #[divan::bench]
    fn entropy_tail(bencher: Bencher) {
        bencher
            .with_inputs(|| sample_text(64 * 1024))
            .bench_refs(|data| divan::black_box(wolfarc_dxa::huffman::encode(data)));
    }
}

pub mod archive {
    use std::io::Cursor;

    use divan::Bencher;
    use wolfarc_dxa::types::EntryMetadata;
    use wolfarc_dxa::{DxaArchive, DxaWriter, DxaWriterOptions, VersionProfile};

    use super::sample_text;

    fn build_archive() -> Vec<u8> {
        let mut writer = DxaWriter::new(
            Cursor::new(Vec::new()),
            DxaWriterOptions::builder()
                .version(VersionProfile::V8Classic)
                .build(),
        )
        .unwrap();
        for i in 0..32 {
            writer
                .add_file(
                    &format!("maps/map{i:02}.dat"),
                    EntryMetadata::default(),
                    &sample_text(16 * 1024),
                )
                .unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[divan::bench]
    fn open(bencher: Bencher) {
        bencher.with_inputs(build_archive).bench_refs(|data| {
            divan::black_box(DxaArchive::open(Cursor::new(data)).unwrap());
        });
    }

    #[divan::bench(sample_count = 10)]
    fn read_all_entries(bencher: Bencher) {
        let mut archive = DxaArchive::open(Cursor::new(build_archive())).unwrap();
        bencher.bench_local(move || {
            for i in 0..archive.len() {
                divan::black_box(archive.read_entry(i).unwrap());
            }
        });
    }
}

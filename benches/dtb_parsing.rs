// ABOUTME: Benchmarks for device tree parsing and query performance
// ABOUTME: Measures parse, path lookup, compatible walks and cell decoding

use criterion::{Criterion, criterion_group, criterion_main};
use dtb_arena::DeviceTree;

const FDT_BEGIN_NODE: u32 = 1;
const FDT_END_NODE: u32 = 2;
const FDT_PROP: u32 = 3;
const FDT_END: u32 = 9;

/// Minimal blob assembler, enough to synthesize a benchmark image.
#[derive(Default)]
struct Blob {
    structs: Vec<u8>,
    strings: Vec<u8>,
}

impl Blob {
    fn cell(&mut self, value: u32) {
        self.structs.extend_from_slice(&value.to_be_bytes());
    }

    fn begin(&mut self, name: &str) {
        self.cell(FDT_BEGIN_NODE);
        self.structs.extend_from_slice(name.as_bytes());
        self.structs.push(0);
        while self.structs.len() % 4 != 0 {
            self.structs.push(0);
        }
    }

    fn end(&mut self) {
        self.cell(FDT_END_NODE);
    }

    fn prop(&mut self, name: &str, payload: &[u8]) {
        let name_offset = self.strings.len() as u32;
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        self.cell(FDT_PROP);
        self.cell(payload.len() as u32);
        self.cell(name_offset);
        self.structs.extend_from_slice(payload);
        while self.structs.len() % 4 != 0 {
            self.structs.push(0);
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.cell(FDT_END);
        let structs_off = 56usize;
        let strings_off = structs_off + self.structs.len();
        let total = strings_off + self.strings.len();
        let mut blob = Vec::with_capacity(total);
        let fields = [
            0xd00d_feedu32,
            total as u32,
            structs_off as u32,
            strings_off as u32,
            40,
            17,
            16,
            0,
            self.strings.len() as u32,
            self.structs.len() as u32,
        ];
        for field in fields {
            blob.extend_from_slice(&field.to_be_bytes());
        }
        blob.extend_from_slice(&[0u8; 16]);
        blob.extend_from_slice(&self.structs);
        blob.extend_from_slice(&self.strings);
        blob
    }
}

/// A flat soc bus with many devices, a handful of them UARTs.
fn synthetic_blob(devices: u32) -> Vec<u8> {
    let mut blob = Blob::default();
    blob.begin("");
    blob.prop("#address-cells", &2u32.to_be_bytes());
    blob.prop("#size-cells", &1u32.to_be_bytes());
    blob.begin("chosen");
    blob.prop("bootargs", b"console=ttyS0\0");
    blob.end();
    blob.begin("soc");
    for index in 0..devices {
        let name = format!("dev@{index:x}");
        blob.begin(&name);
        let compatible: &[u8] = if index % 16 == 0 {
            b"ns16550a\0"
        } else {
            b"bench,stub\0"
        };
        blob.prop("compatible", compatible);
        blob.prop("reg", &[&index.to_be_bytes()[..], &0x1000u32.to_be_bytes()[..]].concat());
        blob.prop("phandle", &(index + 1).to_be_bytes());
        blob.end();
    }
    blob.end();
    blob.end();
    blob.finish()
}

fn bench_parse(c: &mut Criterion) {
    let blob = synthetic_blob(256);

    c.bench_function("parse_tree", |b| {
        b.iter(|| DeviceTree::parse(&blob).unwrap())
    });
}

fn bench_path_lookup(c: &mut Criterion) {
    let blob = synthetic_blob(256);
    let tree = DeviceTree::parse(&blob).unwrap();

    c.bench_function("find_path", |b| {
        b.iter(|| tree.find("/soc/dev").unwrap())
    });
}

fn bench_compatible_walk(c: &mut Criterion) {
    let blob = synthetic_blob(256);
    let tree = DeviceTree::parse(&blob).unwrap();

    c.bench_function("find_compatible_walk", |b| {
        b.iter(|| {
            let mut count = 0;
            let mut hit = tree.find_compatible(None, "ns16550a");
            while let Some(node) = hit {
                count += 1;
                hit = tree.find_compatible(Some(node), "ns16550a");
            }
            count
        })
    });
}

fn bench_phandle_lookup(c: &mut Criterion) {
    let blob = synthetic_blob(256);
    let tree = DeviceTree::parse(&blob).unwrap();

    c.bench_function("find_phandle", |b| {
        b.iter(|| tree.find_phandle(200).unwrap())
    });
}

fn bench_cell_decode(c: &mut Criterion) {
    let blob = synthetic_blob(256);
    let tree = DeviceTree::parse(&blob).unwrap();
    let reg = tree.find("/soc/dev").unwrap().find_prop("reg").unwrap();

    c.bench_function("read_cell_array", |b| {
        b.iter(|| {
            let mut cells = [0u32; 2];
            reg.read_cell_array(1, &mut cells)
        })
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_path_lookup,
    bench_compatible_walk,
    bench_phandle_lookup,
    bench_cell_decode
);
criterion_main!(benches);

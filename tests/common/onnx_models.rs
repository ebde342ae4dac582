//! Tiny ONNX classifiers for the synthetic glyphs
//!
//! Each graph is `Flatten -> Gemm` over an NCHW `[1, 1, 50, 30]` input. The
//! weight of a class is positive on the pixels of its glyph and negative
//! elsewhere, so the matching class always has the highest logit.
//!
//! The protobuf is written by hand to keep the tests free of an ONNX
//! toolchain. Field numbers follow `onnx.proto`.

use super::{in_glyph, HEIGHT, SLOT};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const IR_VERSION: u64 = 7;
const OPSET_VERSION: u64 = 13;
const FLOAT: u64 = 1;
const WEIGHT: f32 = 0.05;

/// `digits.onnx` and `operators.onnx` in a temporary directory
pub struct OnnxModels {
    dir: TempDir,
}

impl OnnxModels {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create model dir");
        let digits: Vec<u32> = (0..10).collect();
        std::fs::write(dir.path().join("digits.onnx"), classifier(&digits))
            .expect("Failed to write digits model");
        std::fs::write(dir.path().join("operators.onnx"), classifier(&[10, 11, 12]))
            .expect("Failed to write operators model");
        Self { dir }
    }

    pub fn digits_path(&self) -> PathBuf {
        self.dir.path().join("digits.onnx")
    }

    pub fn operators_path(&self) -> PathBuf {
        self.dir.path().join("operators.onnx")
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Serialized model with one output class per glyph pattern, in order
pub fn classifier(patterns: &[u32]) -> Vec<u8> {
    let pixels = (SLOT * HEIGHT) as u64;
    let classes = patterns.len() as u64;

    // Gemm B is [pixels, classes], row-major; flattened index is y * SLOT + x
    let mut weights = Vec::with_capacity((pixels * classes) as usize);
    for y in 0..HEIGHT {
        for x in 0..SLOT {
            for &pattern in patterns {
                weights.push(if in_glyph(pattern, x, y) { WEIGHT } else { -WEIGHT });
            }
        }
    }
    let bias = vec![0.0; patterns.len()];

    let mut graph = Vec::new();
    message(&mut graph, 1, &node("Flatten", &["glyph"], "flat"));
    message(&mut graph, 1, &node("Gemm", &["flat", "weights", "bias"], "scores"));
    string(&mut graph, 2, "glyph-classifier");
    message(&mut graph, 5, &tensor("weights", &[pixels, classes], &weights));
    message(&mut graph, 5, &tensor("bias", &[classes], &bias));
    message(&mut graph, 11, &value_info("glyph", &[1, 1, HEIGHT as u64, SLOT as u64]));
    message(&mut graph, 12, &value_info("scores", &[1, classes]));

    let mut opset = Vec::new();
    uint(&mut opset, 2, OPSET_VERSION);

    let mut model = Vec::new();
    uint(&mut model, 1, IR_VERSION);
    string(&mut model, 2, "captcha-solver-tests");
    message(&mut model, 7, &graph);
    message(&mut model, 8, &opset);
    model
}

fn node(op_type: &str, inputs: &[&str], output: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    for input in inputs {
        string(&mut buf, 1, input);
    }
    string(&mut buf, 2, output);
    string(&mut buf, 3, output);
    string(&mut buf, 4, op_type);
    buf
}

fn tensor(name: &str, dims: &[u64], data: &[f32]) -> Vec<u8> {
    let mut buf = Vec::new();
    for &dim in dims {
        uint(&mut buf, 1, dim);
    }
    uint(&mut buf, 2, FLOAT);
    string(&mut buf, 8, name);
    let raw: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    message(&mut buf, 9, &raw);
    buf
}

fn value_info(name: &str, dims: &[u64]) -> Vec<u8> {
    let mut shape = Vec::new();
    for &dim in dims {
        let mut dimension = Vec::new();
        uint(&mut dimension, 1, dim);
        message(&mut shape, 1, &dimension);
    }

    let mut tensor_type = Vec::new();
    uint(&mut tensor_type, 1, FLOAT);
    message(&mut tensor_type, 2, &shape);

    let mut type_proto = Vec::new();
    message(&mut type_proto, 1, &tensor_type);

    let mut buf = Vec::new();
    string(&mut buf, 1, name);
    message(&mut buf, 2, &type_proto);
    buf
}

fn varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn uint(buf: &mut Vec<u8>, field: u64, value: u64) {
    varint(buf, field << 3);
    varint(buf, value);
}

fn message(buf: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    varint(buf, (field << 3) | 2);
    varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn string(buf: &mut Vec<u8>, field: u64, value: &str) {
    message(buf, field, value.as_bytes());
}


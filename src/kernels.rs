//! Built-in per-base compute kernels
//!
//! Arithmetic propagates NaN; only [`Mean`] skips it.

use crate::core::{Chunk, ComputeContext, ComputeFunction};
use anyhow::{bail, ensure};
use std::fmt;
use std::str::FromStr;

/// Multiply every value of the first track by a constant
#[derive(Debug, Clone, Copy)]
pub struct Scale(pub f32);

impl ComputeFunction for Scale {
    fn compute(&self, chunk: &Chunk, ctx: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> {
        let values = ctx.query(0, chunk.interval())?;
        Ok(values.into_iter().map(|v| v * self.0).collect())
    }
}

/// `log_base(value + pseudocount)` of the first track
#[derive(Debug, Clone, Copy)]
pub struct Log {
    pub base: f32,
    pub pseudocount: f32,
}

impl Log {
    pub fn new(base: f32, pseudocount: f32) -> anyhow::Result<Self> {
        ensure!(
            base > 0.0 && base != 1.0,
            "logarithm base must be positive and not 1, got {}",
            base
        );
        Ok(Self { base, pseudocount })
    }
}

impl ComputeFunction for Log {
    fn compute(&self, chunk: &Chunk, ctx: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> {
        let values = ctx.query(0, chunk.interval())?;
        Ok(values
            .into_iter()
            .map(|v| (v + self.pseudocount).log(self.base))
            .collect())
    }
}

/// Binary operation applied base by base to two tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl MathOp {
    pub fn apply(&self, a: f32, b: f32) -> f32 {
        match self {
            MathOp::Add => a + b,
            MathOp::Subtract => a - b,
            MathOp::Multiply => a * b,
            MathOp::Divide => a / b,
        }
    }
}

impl FromStr for MathOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "add" | "+" => Ok(MathOp::Add),
            "subtract" | "sub" | "-" => Ok(MathOp::Subtract),
            "multiply" | "mul" | "*" => Ok(MathOp::Multiply),
            "divide" | "div" | "/" => Ok(MathOp::Divide),
            other => bail!("unknown operation '{}'", other),
        }
    }
}

impl fmt::Display for MathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MathOp::Add => "add",
            MathOp::Subtract => "subtract",
            MathOp::Multiply => "multiply",
            MathOp::Divide => "divide",
        };
        write!(f, "{}", name)
    }
}

/// `track0 <op> track1`
#[derive(Debug, Clone, Copy)]
pub struct Math(pub MathOp);

impl ComputeFunction for Math {
    fn compute(&self, chunk: &Chunk, ctx: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> {
        ensure!(
            ctx.readers() == 2,
            "{} needs exactly 2 input tracks, got {}",
            self.0,
            ctx.readers()
        );
        let a = ctx.query_or_missing(0, chunk.interval())?;
        let b = ctx.query_or_missing(1, chunk.interval())?;
        Ok(a.iter().zip(&b).map(|(x, y)| self.0.apply(*x, *y)).collect())
    }
}

/// Per-base mean over every input track, ignoring NaN
///
/// Bases where every track is NaN stay NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl ComputeFunction for Mean {
    fn compute(&self, chunk: &Chunk, ctx: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> {
        let tracks = ctx.query_all(chunk.interval())?;
        let len = chunk.len() as usize;
        let mut sums = vec![0f64; len];
        let mut counts = vec![0u32; len];
        for track in &tracks {
            for (i, v) in track.iter().enumerate() {
                if !v.is_nan() {
                    sums[i] += *v as f64;
                    counts[i] += 1;
                }
            }
        }
        Ok(sums
            .into_iter()
            .zip(counts)
            .map(|(s, n)| if n == 0 { f32::NAN } else { (s / n as f64) as f32 })
            .collect())
    }
}

/// Constant output over the whole domain
#[derive(Debug, Clone, Copy)]
pub struct Fill(pub f32);

impl ComputeFunction for Fill {
    fn compute(&self, chunk: &Chunk, _ctx: &ComputeContext<'_>) -> anyhow::Result<Vec<f32>> {
        Ok(vec![self.0; chunk.len() as usize])
    }
}

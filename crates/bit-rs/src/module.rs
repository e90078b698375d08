//! Parameter traversal for assembled models.
//!
//! Visitors walk the module tree and hand each parameter to a callback under
//! a '/'-delimited path, matching the naming convention used by persisted
//! weight archives.

use anyhow::{ensure, Result};

use crate::tensor::Tensor;

pub type VisitParamsFn<'a> = dyn FnMut(&str, &Tensor) -> Result<()> + 'a;
pub type VisitParamsMutFn<'a> = dyn FnMut(&str, &mut Tensor) -> Result<()> + 'a;

#[derive(Default)]
struct ParamPath {
    segments: Vec<String>,
}

impl ParamPath {
    fn push(&mut self, segment: &str) -> Result<()> {
        ensure!(
            !segment.is_empty(),
            "parameter path segments must be non-empty"
        );
        ensure!(
            !segment.contains('/'),
            "parameter path segments must not contain '/', got '{segment}'"
        );
        ensure!(
            segment.is_ascii(),
            "parameter path segments must be ASCII, got '{segment}'"
        );
        self.segments.push(segment.to_string());
        Ok(())
    }

    fn pop(&mut self) {
        let _ = self.segments.pop();
    }

    fn join(&self, scratch: &mut String, leaf: &str) {
        scratch.clear();
        for seg in &self.segments {
            scratch.push_str(seg);
            scratch.push('/');
        }
        scratch.push_str(leaf);
    }
}

pub struct ParamVisitor<'a> {
    path: ParamPath,
    scratch: String,
    f: &'a mut VisitParamsFn<'a>,
}

impl<'a> ParamVisitor<'a> {
    pub fn new(f: &'a mut VisitParamsFn<'a>) -> Self {
        Self {
            path: ParamPath::default(),
            scratch: String::new(),
            f,
        }
    }

    pub fn scoped(
        &mut self,
        segment: &str,
        inner: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.path.push(segment)?;
        let out = inner(self);
        self.path.pop();
        out
    }

    pub fn param(&mut self, leaf: &str, tensor: &Tensor) -> Result<()> {
        ensure!(!leaf.is_empty(), "parameter leaf names must be non-empty");
        ensure!(
            !leaf.contains('/'),
            "parameter leaf names must not contain '/', got '{leaf}'"
        );
        self.path.join(&mut self.scratch, leaf);
        (self.f)(self.scratch.as_str(), tensor)
    }
}

pub struct ParamVisitorMut<'a> {
    path: ParamPath,
    scratch: String,
    f: &'a mut VisitParamsMutFn<'a>,
}

impl<'a> ParamVisitorMut<'a> {
    pub fn new(f: &'a mut VisitParamsMutFn<'a>) -> Self {
        Self {
            path: ParamPath::default(),
            scratch: String::new(),
            f,
        }
    }

    pub fn scoped(
        &mut self,
        segment: &str,
        inner: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.path.push(segment)?;
        let out = inner(self);
        self.path.pop();
        out
    }

    pub fn param(&mut self, leaf: &str, tensor: &mut Tensor) -> Result<()> {
        ensure!(!leaf.is_empty(), "parameter leaf names must be non-empty");
        ensure!(
            !leaf.contains('/'),
            "parameter leaf names must not contain '/', got '{leaf}'"
        );
        self.path.join(&mut self.scratch, leaf);
        (self.f)(self.scratch.as_str(), tensor)
    }
}

pub trait Module {
    fn visit_params(&self, v: &mut ParamVisitor<'_>) -> Result<()>;
    fn visit_params_mut(&mut self, v: &mut ParamVisitorMut<'_>) -> Result<()>;
}

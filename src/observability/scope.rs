//! ObservationScope for begin/complete logging around long operations
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` with `elapsed_ms` on `complete()`
//! - Logs `{name}_FAILED` on `fail()`
//! - Logs `{name}_INCOMPLETE` if dropped without either

use std::time::Instant;

use super::logger::Logger;

pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    finished: bool,
}

impl ObservationScope {
    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, Vec::new())
    }

    /// Scope whose fields are repeated on every line it logs
    pub fn with_fields(name: &'static str, fields: Vec<(&'static str, String)>) -> Self {
        let scope = Self {
            name,
            fields,
            started: Instant::now(),
            finished: false,
        };
        Logger::info(&format!("{}_BEGIN", name), &scope.field_refs(&[]));
        scope
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms();
        let mut fields = self.field_refs(extra);
        fields.push(("elapsed_ms", &elapsed));
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        let mut fields = self.field_refs(&[]);
        fields.push(("reason", reason));
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }

    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    fn field_refs<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        self.fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .chain(extra.iter().copied())
            .collect()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            let fields = self.field_refs(&[("reason", "scope dropped without completion")]);
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}

//! Textual IR emission buffers.
//!
//! A [`CodeContext`] is an append-only buffer of IR lines that tracks
//! the current basic-block label and whether the block already ended in
//! a terminator, so control-flow emission never produces a second
//! terminator or dead instructions. [`ContextUtils`] partitions output
//! into the *constant* region, the *declarations* region, and a stack of
//! per-function *active* bodies; the final document concatenates the
//! regions in that order.

#[derive(Debug, Default)]
pub struct CodeContext {
    lines: Vec<String>,
    current_label: String,
    terminated: bool,
}

impl CodeContext {
    pub fn new() -> Self {
        CodeContext {
            lines: Vec::new(),
            current_label: "entry".to_string(),
            terminated: false,
        }
    }

    /// Appends an unindented line (type definitions, globals, function
    /// headers).
    pub fn raw(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Appends one instruction to the active basic block. Instructions
    /// after a terminator are unreachable and are dropped.
    pub fn append(&mut self, line: impl AsRef<str>) {
        if self.terminated {
            return;
        }
        self.lines.push(format!("  {}", line.as_ref()));
    }

    /// Appends a terminator and closes the block.
    pub fn terminator(&mut self, line: impl AsRef<str>) {
        if self.terminated {
            return;
        }
        self.lines.push(format!("  {}", line.as_ref()));
        self.terminated = true;
    }

    /// Starts a new basic block.
    pub fn label(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.lines.push(format!("{}:", name));
        self.current_label = name;
        self.terminated = false;
    }

    /// An unconditional branch, guarded against already-closed blocks.
    pub fn branch(&mut self, label: &str) {
        self.terminator(format!("br label %{}", label));
    }

    pub fn current_label(&self) -> &str {
        &self.current_label
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn write_to(&self, out: &mut String) {
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
    }
}

#[derive(Debug, Default)]
pub struct ContextUtils {
    constant: CodeContext,
    declarations: CodeContext,
    active: Vec<CodeContext>,
    closed: Vec<CodeContext>,
}

impl ContextUtils {
    pub fn new() -> Self {
        ContextUtils::default()
    }

    pub fn constant(&mut self) -> &mut CodeContext {
        &mut self.constant
    }

    pub fn declarations(&mut self) -> &mut CodeContext {
        &mut self.declarations
    }

    /// Opens a fresh function emission context.
    pub fn add_new_context(&mut self) {
        self.active.push(CodeContext::new());
    }

    /// Closes the innermost function context and queues it for output.
    /// Closing without an open context is an internal invariant
    /// violation.
    pub fn close_context(&mut self) {
        match self.active.pop() {
            Some(ctx) => self.closed.push(ctx),
            None => panic!("closing an emission context without an open one"),
        }
    }

    /// The innermost function body under emission.
    pub fn active(&mut self) -> &mut CodeContext {
        match self.active.last_mut() {
            Some(ctx) => ctx,
            None => panic!("no active emission context"),
        }
    }

    /// The final IR document: constants, declarations, then function
    /// bodies in emission order.
    pub fn write_ir(&self) -> String {
        let mut out = String::new();
        self.constant.write_to(&mut out);
        out.push('\n');
        self.declarations.write_to(&mut out);
        out.push('\n');
        for ctx in &self.closed {
            ctx.write_to(&mut out);
            out.push('\n');
        }
        out
    }

    pub fn open_contexts(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_after_terminator_is_dropped() {
        let mut ctx = CodeContext::new();
        ctx.label("entry");
        ctx.terminator("ret void");
        ctx.branch("next");
        let mut out = String::new();
        ctx.write_to(&mut out);
        assert!(out.contains("ret void"));
        assert!(!out.contains("br label %next"));
    }

    #[test]
    fn labels_reopen_blocks() {
        let mut ctx = CodeContext::new();
        ctx.terminator("ret void");
        ctx.label("after");
        assert!(!ctx.is_terminated());
        assert_eq!(ctx.current_label(), "after");
    }

    #[test]
    #[should_panic(expected = "without an open one")]
    fn close_without_open_is_an_invariant_violation() {
        let mut contexts = ContextUtils::new();
        contexts.close_context();
    }
}

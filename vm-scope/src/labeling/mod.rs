//! Stack label rendering.
//!
//! Turns a leaf-first frame chain into the `file:name:line(;file:name:line)*`
//! label the stack tree folds on. The walk is allocation-free: frames are
//! visited root-first by recursing down the `back()` chain and formatted
//! directly into the sampler's preallocated [`LabelBuf`].

pub mod buffer;
pub mod filters;

pub use buffer::{LabelBuf, FORMAT_BUF_SIZE};
pub use filters::LabelConfig;

use std::fmt::Write;

use crate::domain::LabelError;
use crate::host::FrameView;

/// Upper bound on frame-chain depth; anything deeper is treated as resource
/// exhaustion and the sample is discarded.
pub const MAX_STACK_DEPTH: usize = 4096;

/// Append the label of `leaf`'s frame chain to `buf`, root first.
///
/// A `;` separator is written before every kept frame whenever the buffer is
/// non-empty, so callers can prefix a thread name and stacks concatenate
/// cleanly. On error the buffer contents are unspecified; callers roll back
/// to their own mark and drop the sample.
pub fn format_stack(
    leaf: &dyn FrameView,
    cfg: &LabelConfig,
    buf: &mut LabelBuf,
) -> Result<(), LabelError> {
    emit_chain(leaf, cfg, buf, 0)
}

fn emit_chain(
    frame: &dyn FrameView,
    cfg: &LabelConfig,
    buf: &mut LabelBuf,
    depth: usize,
) -> Result<(), LabelError> {
    if depth >= MAX_STACK_DEPTH {
        return Err(LabelError::StackTooDeep {
            max: MAX_STACK_DEPTH,
        });
    }
    // Callers print before callees: recurse to the root first.
    if let Some(back) = frame.back() {
        emit_chain(back, cfg, buf, depth + 1)?;
    }

    let code = frame.code();
    let filename = code.filename();
    let name = code.qualified_name().unwrap_or_else(|| code.name());
    if !cfg.keeps_frame(filename, name) {
        return Ok(());
    }

    let lineno = if cfg.tree_mode {
        frame.current_line()
    } else {
        code.first_line()
    };
    let sep = if buf.is_empty() { "" } else { ";" };
    write!(buf, "{sep}{filename}:{name}:{lineno}").map_err(|_| LabelError::BufferOverflow {
        capacity: buf.capacity(),
    })?;
    Ok(())
}

use thiserror::Error;
use tracing::error;

/// A non-fatal problem encountered while mounting or patching.
///
/// The engine never aborts an operation because of one of these. It yields no host node for the affected position
/// (or leaves the host tree as it was for a failed primitive) and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
	#[error("Invalid virtual node: {reason}")]
	InvalidVirtualNode { reason: String },
	#[error("Host adapter failed to {operation}: {message}")]
	Host { operation: &'static str, message: String },
	#[error("Depth limit ({limit}) reached")]
	DepthLimitReached { limit: usize },
	/// A [`Renderer`](`crate::Renderer`) method was called while the renderer was busy, and did nothing.
	#[error("Renderer re-entered to {operation} while busy; the call was ignored")]
	Reentered { operation: &'static str },
}

/// Where diagnostics go: the `tracing` error log, and a buffer the embedder drains.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
	pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
		error!("{}", diagnostic);
		self.0.push(diagnostic);
	}

	pub(crate) fn host_failure(&mut self, operation: &'static str, error: &impl core::fmt::Debug) {
		self.report(Diagnostic::Host {
			operation,
			message: format!("{:?}", error),
		});
	}

	pub(crate) fn take(&mut self) -> Vec<Diagnostic> {
		std::mem::take(&mut self.0)
	}
}

/// Content as it may appear in log fields.
pub(crate) fn redact(content: &str) -> &str {
	if cfg!(feature = "dangerous-logging") {
		content
	} else {
		"<redacted>"
	}
}

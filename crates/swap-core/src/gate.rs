//! Chain gating for the swap view.

use serde::{Deserialize, Serialize};

/// What the swap view may show for the wallet's current chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum SwapView {
	/// Only a prompt to switch networks is shown.
	WrongChain { current: u64, required: u64 },
	/// The swap form is available.
	Ready { chain_id: u64 },
}

impl SwapView {
	pub fn for_chain(current: u64, required: u64) -> Self {
		if current == required {
			SwapView::Ready { chain_id: current }
		} else {
			SwapView::WrongChain { current, required }
		}
	}

	pub fn is_ready(&self) -> bool {
		matches!(self, SwapView::Ready { .. })
	}

	/// Text of the switch-network prompt, if one is needed.
	pub fn prompt(&self) -> Option<String> {
		match self {
			SwapView::WrongChain { current, required } => Some(format!(
				"Connected to chain {}. Switch to chain {} to swap.",
				current, required
			)),
			SwapView::Ready { .. } => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_only_required_chain_is_ready() {
		assert!(SwapView::for_chain(137, 137).is_ready());
		let view = SwapView::for_chain(1, 137);
		assert_eq!(
			view,
			SwapView::WrongChain {
				current: 1,
				required: 137
			}
		);
		assert!(view.prompt().unwrap().contains("137"));
		assert_eq!(SwapView::for_chain(137, 137).prompt(), None);
	}
}

// ABOUTME: Pagination support: page URL sequencing and inter-page/inter-item pacing.
// ABOUTME: Re-exports the scheme enum, the resolver, and the delay range type.

pub mod address;
pub mod pacing;

pub use address::{resolve, PageAddress, PreviousPage, SuffixStyle};
pub use pacing::{pause, DelayRange};

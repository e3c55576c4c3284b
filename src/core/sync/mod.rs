/*!
 * Synchronization Primitives
 *
 * Wait/notify primitive used by blocking socket operations:
 * - Generation-counted condvar queue, one per socket object
 * - Protocols notify it when data, space, or connection state changes
 * - Blocked tasks re-check their predicate after every wake
 *
 * # Use Cases
 *
 * - **Send path**: Wait for transport buffer space
 * - **Receive path**: Wait for data or an orderly shutdown
 * - **Accept/connect**: Wait for a peer
 */

mod wait;

pub use wait::{WaitOutcome, WaitQueue};

/*!
 * Socket Abstraction Layer
 *
 * Turns small integer descriptors into reference-counted, protocol
 * polymorphic endpoints:
 *
 * - `descriptor`: lock-free descriptor table
 * - `socket`: the shared socket object and its lifecycle
 * - `state` / `options`: state word and option mask codecs
 * - `interface`: per-family capability trait and registry
 * - `clone`: dup and accept object construction
 * - `send` / `recv` / `connection`: blocking operations
 * - `layer`: descriptor-level API
 * - `local`: built-in `AF_LOCAL` family
 */

pub mod addr;
mod blocking;
pub mod clone;
pub mod connection;
pub mod descriptor;
pub mod flags;
pub mod interface;
pub mod layer;
pub mod local;
pub mod options;
pub mod recv;
pub mod send;
pub mod socket;
pub mod state;

pub use addr::{AddressFamily, SockAddr, Shutdown, SocketType};
pub use blocking::IoContext;
pub use clone::clone_socket;
pub use descriptor::DescriptorTable;
pub use flags::{DescriptorFlags, MsgFlags, PollEvents};
pub use interface::{
    Accepted, Attempt, DestinationPolicy, InterfaceRegistry, ProtocolState, Received, SocketInterface,
};
pub use layer::SocketLayer;
pub use local::LocalInterface;
pub use options::{Linger, OptionMask, OptionValue, OptionValues, SocketOption, SOL_SOCKET};
pub use socket::{ActivityGuard, SocketObject, SocketRef};
pub use state::{Activity, Connection, SocketFlags};

/*!
 * Flag Sets
 * Message flags, poll readiness and per-descriptor flags
 */

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Per-call message flags (`MSG_*`)
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MsgFlags: u32 {
        /// Out-of-band data
        const OOB       = 0x0001;
        /// Look at data without consuming it
        const PEEK      = 0x0002;
        /// Bypass routing
        const DONTROUTE = 0x0004;
        /// Datagram was truncated
        const TRUNC     = 0x0020;
        /// Do not block this call only
        const DONTWAIT  = 0x0040;
        /// End of record
        const EOR       = 0x0080;
        /// Wait for the full request
        const WAITALL   = 0x0100;
        /// Do not raise SIGPIPE on a broken pipe
        const NOSIGNAL  = 0x4000;
        /// More data follows
        const MORE      = 0x8000;
    }
}

impl MsgFlags {
    /// Flags the socket core consumes itself, valid for every interface
    pub const CORE: MsgFlags = MsgFlags::DONTWAIT.union(MsgFlags::NOSIGNAL);
}

impl Default for MsgFlags {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Readiness reported by an interface's poll operation
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PollEvents: u16 {
        /// Data (or a pending connection) can be read
        const IN  = 0x0001;
        /// Urgent data available
        const PRI = 0x0002;
        /// Sending will not block
        const OUT = 0x0004;
        /// Error condition
        const ERR = 0x0008;
        /// Peer hung up
        const HUP = 0x0010;
    }
}

impl Default for PollEvents {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for PollEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(none)");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        Ok(())
    }
}

bitflags! {
    /// Flags private to one descriptor, never shared with duplicates
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DescriptorFlags: u32 {
        /// Close on exec
        const CLOEXEC = 0x0001;
    }
}

impl Default for DescriptorFlags {
    fn default() -> Self {
        Self::empty()
    }
}

//! Data structures shared across the daemon.
//!
//! These records are transient: they are rebuilt from a fresh runtime
//! snapshot on every reconciliation pass and never persisted.

/// One (container, network) attachment as reported by the runtime.
#[derive(Debug, Clone)]
pub struct NetworkAttachment {
    /// Name of the network the container is joined to.
    pub network: String,
    /// IPv4 address on that network. May be empty, in which case the
    /// attachment is skipped during synthesis.
    pub ip_address: String,
    /// User-declared network aliases, in declaration order.
    pub aliases: Vec<String>,
}

/// Inspection detail for one running container.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    /// Container name without the leading slash.
    pub name: String,
    /// Configured hostname, which may or may not differ from the name.
    pub hostname: String,
    /// Network attachments in a stable order.
    pub networks: Vec<NetworkAttachment>,
}

/// One IP-to-names record destined for the managed hosts file section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Unique within one reconciliation pass.
    pub ip: String,
    /// Deduplicated names, each short form followed by its fully-qualified
    /// form, in order of first appearance.
    pub names: Vec<String>,
}

impl HostEntry {
    /// Render as a hosts file line, without the trailing newline.
    pub fn render(&self) -> String {
        format!("{} {}", self.ip, self.names.join(" "))
    }
}

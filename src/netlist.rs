// SPDX-License-Identifier: Apache-2.0

//! Transistor-level cell netlists.
//!
//! A cell is stored as text, one transistor per line, in SPICE field order:
//!
//! ```text
//! <id> <diffusion-a> <gate> <diffusion-b> <bulk> <NMOS|PMOS>
//! ```
//!
//! Node names carry their category in the first character: `I*` are inputs,
//! `O*` outputs, `N*` internal nets and anything else (e.g. `VDD`, `GND`) is a
//! supply rail.

use std::collections::HashMap;

use crate::cleanup_error::{CleanupError, CleanupResult};

/// Number of whitespace-separated fields on a transistor line.
pub const FIELD_COUNT: usize = 6;

/// Upper bound on transistors per cell; the diffusion-swap choices of a cell
/// are indexed by a `u64` mask.
pub const MAX_TRANSISTORS: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeCategory {
    Input,
    Output,
    Internal,
    Supply,
}

impl NodeCategory {
    /// Categories whose members may be freely renamed among themselves.
    pub const RENAMEABLE: [NodeCategory; 3] = [
        NodeCategory::Input,
        NodeCategory::Internal,
        NodeCategory::Output,
    ];

    pub fn of(name: &str) -> Self {
        match name.chars().next() {
            Some('I') => NodeCategory::Input,
            Some('O') => NodeCategory::Output,
            Some('N') => NodeCategory::Internal,
            _ => NodeCategory::Supply,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeCategory::Input => "in",
            NodeCategory::Output => "out",
            NodeCategory::Internal => "internal",
            NodeCategory::Supply => "supply",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransistorId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalRole {
    Gate,
    DiffusionA,
    DiffusionB,
}

/// Back-reference from a node to one transistor terminal attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerminalRef {
    pub transistor: TransistorId,
    pub role: TerminalRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: String,
    category: NodeCategory,
    terminals: Vec<TerminalRef>,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            category: NodeCategory::of(name),
            terminals: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category is fixed at creation and survives renaming.
    pub fn category(&self) -> NodeCategory {
        self.category
    }

    pub fn terminals(&self) -> &[TerminalRef] {
        &self.terminals
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransistorKind {
    Nmos,
    Pmos,
}

impl TransistorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransistorKind::Nmos => "NMOS",
            TransistorKind::Pmos => "PMOS",
        }
    }
}

impl std::str::FromStr for TransistorKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NMOS" => Ok(Self::Nmos),
            "PMOS" => Ok(Self::Pmos),
            _ => Err(format!("unrecognized transistor type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transistor {
    name: String,
    kind: TransistorKind,
    gate: NodeId,
    diffusion: [NodeId; 2],
    bulk: String,
}

impl Transistor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TransistorKind {
        self.kind
    }

    pub fn gate(&self) -> NodeId {
        self.gate
    }

    /// The two interchangeable diffusion terminals, in stored order.
    pub fn diffusion(&self) -> [NodeId; 2] {
        self.diffusion
    }

    pub fn bulk(&self) -> &str {
        &self.bulk
    }

    pub fn terminal(&self, role: TerminalRole) -> NodeId {
        match role {
            TerminalRole::Gate => self.gate,
            TerminalRole::DiffusionA => self.diffusion[0],
            TerminalRole::DiffusionB => self.diffusion[1],
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

/// Appends one transistor line in stored field order.
pub(crate) fn push_transistor_line(
    out: &mut String,
    id: &str,
    diffusion: [&str; 2],
    gate: &str,
    bulk: &str,
    kind: TransistorKind,
    swap_diffusion: bool,
) {
    let (a, b) = if swap_diffusion {
        (diffusion[1], diffusion[0])
    } else {
        (diffusion[0], diffusion[1])
    };
    for field in [id, a, gate, b, bulk] {
        out.push_str(field);
        out.push(' ');
    }
    out.push_str(kind.as_str());
    out.push('\n');
}

/// Counts used to reject non-isomorphic pairs without enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetlistShape {
    pub nmos: usize,
    pub pmos: usize,
    pub inputs: usize,
    pub internals: usize,
    pub outputs: usize,
    /// Supply rails are fixed points of every relabeling, so they must match
    /// by name.
    pub supplies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netlist {
    transistors: Vec<Transistor>,
    nodes: Vec<Node>,
    node_index: HashMap<String, NodeId>,
}

impl Netlist {
    /// Parses the textual form of a cell.
    ///
    /// Every non-blank line must describe exactly one transistor; a bad line
    /// fails the whole parse rather than being skipped. Bulk terminals must be
    /// supply rails, and every NMOS id must sort before every PMOS id.
    /// Transistors are stored in ascending-id order whatever the line order,
    /// so parsing the serialized form yields an identical netlist.
    pub fn parse(text: &str) -> CleanupResult<Netlist> {
        let mut lines: Vec<(usize, Vec<&str>, TransistorKind)> = Vec::new();
        let mut seen_ids: HashMap<&str, usize> = HashMap::new();
        let mut last_line = 0;

        for (lineno, line) in text.lines().enumerate() {
            let lineno = lineno + 1;
            last_line = lineno;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let malformed = |reason: String| CleanupError::MalformedNetlist {
                line: lineno,
                reason,
            };
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != FIELD_COUNT {
                return Err(malformed(format!(
                    "expected {} fields, got {}: {:?}",
                    FIELD_COUNT,
                    fields.len(),
                    line
                )));
            }
            let kind: TransistorKind = fields[5].parse().map_err(malformed)?;
            if NodeCategory::of(fields[4]) != NodeCategory::Supply {
                return Err(malformed(format!(
                    "bulk of '{}' is tied to {} net '{}', expected a supply rail",
                    fields[0],
                    NodeCategory::of(fields[4]).label(),
                    fields[4]
                )));
            }
            if let Some(prev) = seen_ids.insert(fields[0], lineno) {
                return Err(malformed(format!(
                    "transistor id '{}' already defined at line {}",
                    fields[0], prev
                )));
            }
            if lines.len() == MAX_TRANSISTORS {
                return Err(malformed(format!(
                    "more than {} transistors",
                    MAX_TRANSISTORS
                )));
            }
            lines.push((lineno, fields, kind));
        }

        if lines.is_empty() {
            return Err(CleanupError::MalformedNetlist {
                line: last_line,
                reason: "netlist has no transistors".to_string(),
            });
        }

        lines.sort_by(|a, b| a.1[0].cmp(b.1[0]));
        let last_nmos = lines.iter().rfind(|l| l.2 == TransistorKind::Nmos);
        let first_pmos = lines.iter().find(|l| l.2 == TransistorKind::Pmos);
        if let (Some(nmos), Some(pmos)) = (last_nmos, first_pmos) {
            if nmos.1[0] > pmos.1[0] {
                return Err(CleanupError::MalformedNetlist {
                    line: nmos.0,
                    reason: format!(
                        "NMOS id '{}' does not sort before PMOS id '{}'",
                        nmos.1[0], pmos.1[0]
                    ),
                });
            }
        }

        let mut netlist = Netlist::default();
        for (_, fields, kind) in lines {
            // Stored order is (diffusion, gate, diffusion); swap the first two
            // fields to bind the gate role first.
            let gate = netlist.intern_node(fields[2]);
            let diffusion = [netlist.intern_node(fields[1]), netlist.intern_node(fields[3])];
            netlist.push_transistor(Transistor {
                name: fields[0].to_string(),
                kind,
                gate,
                diffusion,
                bulk: fields[4].to_string(),
            });
        }
        Ok(netlist)
    }

    fn intern_node(&mut self, name: &str) -> NodeId {
        if let Some(id) = self.node_index.get(name) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(name));
        self.node_index.insert(name.to_string(), id);
        id
    }

    fn push_transistor(&mut self, transistor: Transistor) {
        let id = TransistorId(self.transistors.len());
        let roles = [
            TerminalRole::DiffusionA,
            TerminalRole::Gate,
            TerminalRole::DiffusionB,
        ];
        for role in roles {
            let node = transistor.terminal(role);
            self.nodes[node.0].terminals.push(TerminalRef {
                transistor: id,
                role,
            });
        }
        self.transistors.push(transistor);
    }

    /// Emits the netlist as text, NMOS lines first, each kind in ascending-id
    /// order. `reverse_diffusion[i]` swaps the diffusion terminals of the
    /// `i`-th emitted line; missing flags count as `false`.
    pub fn serialize(&self, reverse_diffusion: &[bool]) -> String {
        let mut order: Vec<&Transistor> = self.transistors.iter().collect();
        order.sort_by(|a, b| (a.kind, &a.name).cmp(&(b.kind, &b.name)));

        let mut out = String::new();
        for (i, t) in order.iter().enumerate() {
            let swap = reverse_diffusion.get(i).copied().unwrap_or(false);
            push_transistor_line(
                &mut out,
                &t.name,
                [self.node_name(t.diffusion[0]), self.node_name(t.diffusion[1])],
                self.node_name(t.gate),
                &t.bulk,
                t.kind,
                swap,
            );
        }
        out
    }

    pub fn to_text(&self) -> String {
        self.serialize(&[])
    }

    pub fn transistors(&self) -> &[Transistor] {
        &self.transistors
    }

    pub fn transistor(&self, id: TransistorId) -> &Transistor {
        &self.transistors[id.0]
    }

    pub fn transistor_ids(&self, kind: TransistorKind) -> Vec<TransistorId> {
        self.transistors
            .iter()
            .enumerate()
            .filter(|(_, t)| t.kind == kind)
            .map(|(i, _)| TransistorId(i))
            .collect()
    }

    pub fn nmos(&self) -> impl Iterator<Item = &Transistor> + '_ {
        self.transistors
            .iter()
            .filter(|t| t.kind == TransistorKind::Nmos)
    }

    pub fn pmos(&self) -> impl Iterator<Item = &Transistor> + '_ {
        self.transistors
            .iter()
            .filter(|t| t.kind == TransistorKind::Pmos)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_index.get(name).map(|id| &self.nodes[id.0])
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    /// Nodes of one category in first-seen order.
    pub fn node_ids(&self, category: NodeCategory) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.category == category)
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    pub fn node_names(&self, category: NodeCategory) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.category == category)
            .map(|n| n.name.as_str())
            .collect()
    }

    pub fn set_node_name(&mut self, id: NodeId, name: &str) {
        let node = &mut self.nodes[id.0];
        self.node_index.remove(&node.name);
        node.set_name(name);
        self.node_index.insert(name.to_string(), id);
    }

    pub fn set_transistor_name(&mut self, id: TransistorId, name: &str) {
        self.transistors[id.0].set_name(name);
    }

    pub fn shape(&self) -> NetlistShape {
        let count = |category: NodeCategory| {
            self.nodes
                .iter()
                .filter(|n| n.category == category)
                .count()
        };
        let mut supplies: Vec<String> = self
            .node_names(NodeCategory::Supply)
            .into_iter()
            .map(str::to_string)
            .collect();
        supplies.sort();
        NetlistShape {
            nmos: self.nmos().count(),
            pmos: self.pmos().count(),
            inputs: count(NodeCategory::Input),
            internals: count(NodeCategory::Internal),
            outputs: count(NodeCategory::Output),
            supplies,
        }
    }
}

impl TryFrom<&str> for Netlist {
    type Error = CleanupError;
    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Netlist::parse(text)
    }
}

impl std::fmt::Display for Netlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

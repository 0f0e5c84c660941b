// emit_c.rs — C static declarations for a linked network
//
// Emits one `Gate` initializer per node in symbol-table order, the arena
// as a single `links` array that activity lists point into, and the
// sorted `sTable` an execution engine searches by name. Node names become
// C identifiers through the codec's mangling.
//
// Preconditions: `net` is a validated link.
// Postconditions: every `&links[i]` lies inside the array; `sTable` is
//   sorted by name and terminated by a null pointer.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::{self, Write};

use crate::alloc::Slot;
use crate::linked::{Backend, LinkedNetwork};
use crate::name::mangle;
use crate::network::{IoLink, Node, NodeKind};
use crate::pipeline::Provenance;

const KIND_LABELS: [&str; 12] = [
    "INPUT", "OUTPUT", "AND", "OR", "XOR", "LATCH", "ARITH", "ALIAS", "CLOCK", "TIMER", "ACTION", "CONST",
];

const ROLE_LABELS: [&str; 10] = [
    "GATE", "GATEX", "ARITH", "ACTION", "CLOCK", "TIMER", "TRAB", "OUTW", "OUTX", "UDFA",
];

/// Backend producing a C translation unit.
#[derive(Debug, Default)]
pub struct CEmitter {
    provenance: Option<Provenance>,
}

impl CEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the inputs in the header comment.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }
}

impl Backend for CEmitter {
    type Output = String;

    fn name(&self) -> &'static str {
        "c"
    }

    fn run(&mut self, net: &LinkedNetwork) -> String {
        let mut buf = String::new();
        let _ = self.write_unit(&mut buf, net);
        buf
    }
}

impl CEmitter {
    fn write_unit(&self, buf: &mut String, net: &LinkedNetwork) -> fmt::Result {
        match &self.provenance {
            Some(p) => {
                writeln!(buf, "/* generated by gatelink {} */", p.linker_version)?;
                for input in &p.inputs {
                    writeln!(buf, "/* input {} sha256:{} */", input.name, input.sha256)?;
                }
            }
            None => writeln!(buf, "/* generated by gatelink */")?,
        }

        writeln!(buf)?;
        writeln!(buf, "typedef struct Gate Gate;")?;
        writeln!(buf, "struct Gate {{")?;
        writeln!(buf, "    const char *name;")?;
        writeln!(buf, "    unsigned char kind;")?;
        writeln!(buf, "    unsigned char role;")?;
        writeln!(buf, "    unsigned short fan_in;")?;
        writeln!(buf, "    Gate **list;")?;
        writeln!(buf, "    Gate *link;")?;
        writeln!(buf, "    long value;")?;
        writeln!(buf, "    unsigned long mask;")?;
        writeln!(buf, "}};")?;

        writeln!(buf)?;
        let kinds: Vec<String> = KIND_LABELS.iter().map(|k| format!("K_{k}")).collect();
        writeln!(buf, "enum {{ {} }};", kinds.join(", "))?;
        let roles: Vec<String> = ROLE_LABELS.iter().map(|r| format!("R_{r}")).collect();
        writeln!(buf, "enum {{ {} }};", roles.join(", "))?;

        let stats = net.stats();
        writeln!(buf)?;
        for (kind, n) in &stats.per_kind {
            writeln!(buf, "/* {kind}: {n} */")?;
        }
        writeln!(buf, "/* nodes: {}, links: {} */", stats.nodes, stats.links)?;

        writeln!(buf)?;
        for id in net.symbols().iter() {
            writeln!(buf, "static Gate {};", mangle(net.name(id)))?;
        }

        writeln!(buf)?;
        let arena = net.arena();
        writeln!(buf, "static Gate *links[{}] = {{", arena.len().max(1))?;
        for slot in arena {
            match slot {
                Slot::Link(id) => writeln!(buf, "    &{},", mangle(net.name(*id)))?,
                Slot::End | Slot::Vacant => writeln!(buf, "    0,")?,
            }
        }
        if arena.is_empty() {
            writeln!(buf, "    0,")?;
        }
        writeln!(buf, "}};")?;

        writeln!(buf)?;
        for id in net.symbols().iter() {
            self.write_gate(buf, net, net.node(id))?;
        }

        writeln!(buf)?;
        writeln!(buf, "Gate *sTable[] = {{")?;
        for id in net.symbols().iter() {
            writeln!(buf, "    &{},", mangle(net.name(id)))?;
        }
        writeln!(buf, "    0,")?;
        writeln!(buf, "}};")?;
        Ok(())
    }

    fn write_gate(&self, buf: &mut String, net: &LinkedNetwork, node: &Node) -> fmt::Result {
        let list = match node.slice {
            Some(s) => format!("&links[{}]", s.start),
            None => "0".to_string(),
        };
        let link = node
            .alias
            .map(|a| a.target)
            .or_else(|| node.action.and_then(|a| a.slave))
            .or(match node.io {
                Some(IoLink::Bit { word, .. }) => Some(word),
                _ => None,
            })
            .map_or_else(|| "0".to_string(), |id| format!("&{}", mangle(net.name(id))));
        let value = node.value.or(node.function.map(i64::from)).unwrap_or(0);
        write!(
            buf,
            "static Gate {} = {{ \"{}\", K_{}, R_{}, {}, {}, {}, {}, 0x{:x} }};",
            mangle(&node.name),
            node.name,
            node.kind.label(),
            node.role.label(),
            node.counts.fan_in,
            list,
            link,
            value,
            node.io_mask
        )?;
        if let NodeKind::Action(action, _) = node.kind {
            write!(buf, " /* {} */", action.mnemonic())?;
        }
        writeln!(buf)
    }
}

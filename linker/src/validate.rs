// validate.rs — PASS 6: consistency validation and I/O binding
//
// Last walk over the sorted symbol table. Checks every node's role and
// linkage and binds every I/O node to a hardware address, producing the
// `IoMap` a driver registers. Duplicate names show up as neighbours in
// the sorted table.
//
// Preconditions: fill complete.
// Postconditions: every action is clocked by a node of matching kind;
//   every I/O word decodes and lies below the I/O byte limit; output word
//   masks are set.
// Failure modes: all problems are recorded as errors; the walk continues.
//   A bit node attached to a word whose name no longer decodes is an
//   internal failure (E0907) and aborts.
// Side effects: sets `io_mask` of byte/word/long outputs; resolves (and
//   compresses) alias chains that were never referenced.

use serde::Serialize;

use crate::alias::{self, AliasError};
use crate::diag::{codes, DiagCode, Diagnostic, DiagSink, PassResult};
use crate::id::NodeId;
use crate::name::{self, Area, IoName, Width};
use crate::network::{ActionKind, IoLink, Network, NodeKind, Role};
use crate::pass::PassId;
use crate::symtab::SymbolTable;

const PHASE: PassId = PassId::Validate;

pub const DEFAULT_IO_BYTES: u32 = 64;

/// One I/O node bound to its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoBinding {
    pub name: String,
    pub node: NodeId,
    pub area: Area,
    pub width: Width,
    pub byte: u32,
    pub bit: Option<u8>,
    pub mask: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IoMap {
    bindings: Vec<IoBinding>,
}

impl IoMap {
    pub fn iter(&self) -> impl Iterator<Item = &IoBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&IoBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &IoBinding> {
        self.bindings.iter().filter(|b| b.area != Area::Output)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &IoBinding> {
        self.bindings.iter().filter(|b| b.area == Area::Output)
    }
}

pub fn validate(net: &mut Network, table: &SymbolTable, io_bytes: u32, sink: &mut DiagSink) -> PassResult<IoMap> {
    let mut v = Validator {
        net,
        sink,
        io_bytes,
        bindings: Vec::new(),
    };
    for id in table.iter() {
        v.node(id)?;
    }
    for pair in table.entries().windows(2) {
        if v.net.name(pair[0]) == v.net.name(pair[1]) {
            let name = v.net.name(pair[0]).to_string();
            v.error(
                codes::E0212,
                format!("'{}' is defined more than once", name),
                &[&name, &name],
            )?;
        }
    }
    let mut bindings = v.bindings;
    bindings.sort_by_key(|b| (b.area, b.width, b.byte, b.bit));
    Ok(IoMap { bindings })
}

struct Validator<'a> {
    net: &'a mut Network,
    sink: &'a mut DiagSink,
    io_bytes: u32,
    bindings: Vec<IoBinding>,
}

impl Validator<'_> {
    fn error(&mut self, code: DiagCode, message: String, nodes: &[&str]) -> PassResult<()> {
        let mut diag = Diagnostic::error(PHASE, code, message);
        for n in nodes {
            diag = diag.with_node(*n);
        }
        self.sink.error(diag)
    }

    fn node(&mut self, id: NodeId) -> PassResult<()> {
        let node = self.net.node(id);
        let (name, kind, role) = (node.name.clone(), node.kind, node.role);
        if role == Role::Undefined {
            return self.error(
                codes::E0211,
                format!("'{}' has an undefined role", name),
                &[&name],
            );
        }
        match (kind, role) {
            (NodeKind::Alias, _) => self.alias(id, &name),
            (NodeKind::Input, r) if r.is_gate() => self.bit(id, &name),
            (_, Role::OutBit) => self.bit(id, &name),
            (NodeKind::Input, Role::Arith | Role::Transfer) => self.input_word(id, &name),
            (NodeKind::Output(_), Role::OutWord) => self.output_word(id, &name),
            (NodeKind::Action(kind, _), Role::Action) => self.action(id, kind, &name),
            _ => Ok(()),
        }
    }

    fn alias(&mut self, id: NodeId, name: &str) -> PassResult<()> {
        match alias::resolve(&mut self.net.nodes, id) {
            Ok(_) => Ok(()),
            Err(AliasError::Cycle { .. }) => self.error(
                codes::E0202,
                format!("alias '{}' is part of an alias cycle", name),
                &[name],
            ),
            Err(AliasError::Dangling { alias }) => {
                let target = self.net.name(alias).to_string();
                self.error(
                    codes::E0213,
                    format!("alias '{}' has no target", target),
                    &[&target, name],
                )
            }
        }
    }

    fn bind(&mut self, id: NodeId, io: IoName, mask: u32) {
        self.bindings.push(IoBinding {
            name: self.net.name(id).to_string(),
            node: id,
            area: io.area,
            width: io.width,
            byte: io.byte,
            bit: io.bit,
            mask,
        });
    }

    fn check_address(&mut self, io: &IoName, name: &str) -> PassResult<bool> {
        if io.area != Area::Timer && io.byte >= self.io_bytes {
            self.error(
                codes::E0303,
                format!("'{}' addresses byte {} beyond the I/O limit of {} bytes", name, io.byte, self.io_bytes),
                &[name],
            )?;
            return Ok(false);
        }
        Ok(true)
    }

    fn bit(&mut self, id: NodeId, name: &str) -> PassResult<()> {
        let link = self.net.node(id).io;
        let Some(IoLink::Bit { mask, .. }) = link else {
            return self.error(
                codes::E0304,
                format!("bit I/O '{}' is not attached to a word", name),
                &[name],
            );
        };
        // a bit that was attached to a word has already decoded once
        let Some(io) = name::decode(name) else {
            return Err(self.sink.internal(
                Diagnostic::error(PHASE, codes::E0907, format!("bit I/O '{}' has no decodable address", name))
                    .with_node(name),
            ));
        };
        if self.check_address(&io, name)? {
            self.bind(id, io, u32::from(mask));
        }
        Ok(())
    }

    fn input_word(&mut self, id: NodeId, name: &str) -> PassResult<()> {
        let io = name::decode(name).filter(|io| {
            io.is_word()
                && match io.area {
                    Area::Input => true,
                    Area::Timer => io.width == Width::Bit && io.byte == 0,
                    Area::Output => false,
                }
        });
        let Some(io) = io else {
            return self.error(
                codes::E0301,
                format!("'{}' is not a valid input word", name),
                &[name],
            );
        };
        if self.check_address(&io, name)? {
            let mask = match io.width {
                Width::Bit => self.net.node(id).io_mask,
                w => w.word_mask(),
            };
            self.bind(id, io, mask);
        }
        Ok(())
    }

    fn output_word(&mut self, id: NodeId, name: &str) -> PassResult<()> {
        let io = name::decode(name).filter(|io| {
            io.area == Area::Output
                && io.bit.is_none()
                && match io.width {
                    Width::Bit => io.tail.is_empty(),
                    _ => io.tail.is_empty() || io.tail == "_0",
                }
        });
        let Some(io) = io else {
            return self.error(
                codes::E0302,
                format!("'{}' is not a valid output word", name),
                &[name],
            );
        };
        if self.check_address(&io, name)? {
            let node = self.net.node_mut(id);
            if io.width != Width::Bit {
                node.io_mask = io.width.word_mask();
            }
            let mask = node.io_mask;
            self.bind(id, io, mask);
        }
        Ok(())
    }

    fn action(&mut self, id: NodeId, kind: ActionKind, name: &str) -> PassResult<()> {
        // missing links were reported while counting
        let Some(links) = self.net.node(id).action else {
            return Ok(());
        };
        if let Some(clock) = links.clock {
            let c = self.net.node(clock);
            let matched = matches!(
                (c.kind, c.role),
                (NodeKind::Clock, Role::Clock) | (NodeKind::Timer, Role::Timer)
            );
            let timed = c.kind == NodeKind::Timer;
            let clock_name = c.name.clone();
            if !matched {
                self.error(
                    codes::E0206,
                    format!("action '{}' is scheduled by '{}' whose role does not match its kind", name, clock_name),
                    &[&clock_name, name],
                )?;
            }
            if let (true, Some(delay)) = (timed, links.delay) {
                let d = self.net.node(delay);
                if d.role != Role::Arith && d.kind != NodeKind::Constant {
                    let delay_name = d.name.clone();
                    self.error(
                        codes::E0207,
                        format!("delay '{}' of timed action '{}' is not arithmetic", delay_name, name),
                        &[&delay_name, name],
                    )?;
                }
            }
        }
        if kind.drives_timer() {
            if let Some(slave) = links.slave {
                let s = self.net.node(slave);
                if s.kind != NodeKind::Timer {
                    let slave_name = s.name.clone();
                    self.error(
                        codes::E0206,
                        format!("timer action '{}' drives '{}' which is not a timer", name, slave_name),
                        &[name, &slave_name],
                    )?;
                }
            }
        }
        Ok(())
    }
}

// listing.rs — Text listing of a linked network
//
// Deterministic, column-aligned report of one link in four sections:
// input lists in module order, the sorted symbol table, activity lists,
// and the I/O map.
//
// Preconditions: `net` is a validated link.
// Postconditions: identical networks give identical text.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::{self, Write};

use crate::linked::LinkedNetwork;
use crate::network::NodeKind;

pub fn emit_listing(net: &LinkedNetwork) -> String {
    let mut buf = String::new();
    let _ = write_listing(&mut buf, net);
    buf
}

fn write_listing(buf: &mut String, net: &LinkedNetwork) -> fmt::Result {
    let stats = net.stats();
    writeln!(buf, "link: {} nodes, {} links", stats.nodes, stats.links)?;

    writeln!(buf)?;
    writeln!(buf, "PASS 1 - input lists")?;
    for module in net.modules() {
        writeln!(buf, "module {}", module.name)?;
        for &id in &module.nodes {
            let node = net.node(id);
            write!(buf, "  {:<10}{:<8}{:<8}", node.name, node.kind.label(), node.role.label())?;
            if let Some(alias) = node.alias {
                let tilde = if alias.invert { "~" } else { "" };
                write!(buf, "-> {}{}", tilde, net.name(alias.target))?;
            }
            if !node.inputs.is_empty() {
                let items: Vec<String> = node
                    .inputs
                    .iter()
                    .map(|(src, inv)| format!("{}{}", if inv { "~" } else { "" }, net.name(src)))
                    .collect();
                write!(buf, ": {}", items.join(", "))?;
            }
            if let Some(links) = node.action {
                if let Some(slave) = links.slave {
                    write!(buf, " => {}", net.name(slave))?;
                }
                if let Some(f) = node.function {
                    write!(buf, " fn {}", f)?;
                }
                if let Some(clock) = links.clock {
                    write!(buf, " @ {}", net.name(clock))?;
                }
                if let Some(delay) = links.delay {
                    write!(buf, " < {}", net.name(delay))?;
                }
            }
            if let Some(v) = node.value {
                write!(buf, " = {}", v)?;
            }
            trim_end(buf);
            writeln!(buf)?;
        }
    }

    writeln!(buf)?;
    writeln!(buf, "PASS 2 - symbol table")?;
    for id in net.symbols().iter() {
        let node = net.node(id);
        write!(
            buf,
            "  {:<10}{:<8}{:<8}in {:<4}out {:<4}",
            node.name,
            node.kind.label(),
            node.role.label(),
            node.counts.fan_in,
            node.counts.fan_out
        )?;
        if node.counts.delay_refs > 0 {
            write!(buf, "delay {}", node.counts.delay_refs)?;
        }
        trim_end(buf);
        writeln!(buf)?;
    }

    writeln!(buf)?;
    writeln!(buf, "PASS 6 - activity lists")?;
    for id in net.symbols().iter() {
        let node = net.node(id);
        let Some(slice) = node.slice else {
            continue;
        };
        let activity = net.activity(id);
        let mut items: Vec<String> = activity.normal().map(|c| net.name(c).to_string()).collect();
        items.extend(activity.inverted().map(|c| format!("~{}", net.name(c))));
        write!(buf, "  {:<10}{:<8}[{:>4}]", node.name, node.role.label(), slice.start)?;
        if !items.is_empty() {
            write!(buf, " {}", items.join(", "))?;
        }
        writeln!(buf)?;
    }

    if !net.io().is_empty() {
        writeln!(buf)?;
        writeln!(buf, "I/O map")?;
        for b in net.io().iter() {
            let kind = if net.node(b.node).kind == NodeKind::Input { "in" } else { "out" };
            write!(buf, "  {:<10}{:<4}byte {:<4}", b.name, kind, b.byte)?;
            match b.bit {
                Some(bit) => write!(buf, "bit {}  ", bit)?,
                None => write!(buf, "       ")?,
            }
            writeln!(buf, "mask 0x{:02x}", b.mask)?;
        }
    }
    Ok(())
}

fn trim_end(buf: &mut String) {
    let len = buf.trim_end_matches(' ').len();
    buf.truncate(len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{load, ObjectSource};
    use crate::pipeline::{link, LinkOptions};

    fn listing(text: &str) -> String {
        let loaded = load(&[ObjectSource { name: "m.gnl", text }]);
        assert!(!loaded.has_errors(), "{:?}", loaded.diagnostics);
        let (linked, _) = link(loaded.network, LinkOptions::default()).unwrap();
        emit_listing(&linked)
    }

    #[test]
    fn sections_in_order() {
        let text = listing("IX0.0 input gate\nA1 and gate : IX0.0\n");
        let p1 = text.find("PASS 1").unwrap();
        let p2 = text.find("PASS 2").unwrap();
        let p6 = text.find("PASS 6").unwrap();
        let io = text.find("I/O map").unwrap();
        assert!(p1 < p2 && p2 < p6 && p6 < io);
        assert!(text.contains("  A1        AND     GATE    : IX0.0\n"));
    }

    #[test]
    fn inverted_consumers_are_marked() {
        let text = listing("IX0.0 input gate\nA1 and gate : IX0.0\nB1 or gate : ~IX0.0\n");
        assert!(text.contains("  IX0.0     GATE    [") && text.contains("] A1, ~B1\n"));
    }

    #[test]
    fn listing_is_deterministic() {
        let src = "module a\nIX0.1 input gate\nIX0.0 input gate\nO1 or gate : IX0.0, IX0.1\n";
        assert_eq!(listing(src), listing(src));
    }
}

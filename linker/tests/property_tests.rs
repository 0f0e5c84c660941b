// Property-based tests for link invariants.
//
// Four categories:
// 1. Name codec: decode/encode and mangle/unmangle are exact inverses
// 2. Alias flattening: any chain resolves to its root with the parity of
//    its inversions, and is compressed afterwards
// 3. Gate splitting: a split gate computes the same function as the
//    unsplit gate, and no gate exceeds the width
// 4. Arena and symbol table: every slot written once, activity lists
//    mirror input lists, symbol order does not depend on declaration order
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use gatelink::alias;
use gatelink::alloc::Slot;
use gatelink::interp::Interpreter;
use gatelink::linked::{Backend, LinkedNetwork};
use gatelink::load::{load, ObjectSource};
use gatelink::name::{self, Area, IoName, Width};
use gatelink::network::{Network, Node, NodeKind, Role};
use gatelink::pipeline::{link, LinkOptions};
use gatelink::split;
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn link_text(text: &str, options: LinkOptions) -> LinkedNetwork {
    let loaded = load(&[ObjectSource { name: "prop.gnl", text }]);
    assert!(!loaded.has_errors(), "load errors: {:?}", loaded.diagnostics);
    match link(loaded.network, options) {
        Ok((net, _)) => net,
        Err(f) => panic!("link failed in {:?}: {:#?}", f.error.failing_pass, f.diagnostics),
    }
}

fn bit_input(i: usize) -> String {
    format!("IX{}.{}", i / 8, i % 8)
}

fn input_ref(name: &str, inverted: bool) -> String {
    if inverted {
        format!("~{name}")
    } else {
        name.to_string()
    }
}

// ── Generators ──────────────────────────────────────────────────────────────

fn arb_io_name() -> impl Strategy<Value = IoName> {
    let area = prop_oneof![Just(Area::Input), Just(Area::Output), Just(Area::Timer)];
    let width = prop_oneof![Just(Width::Bit), Just(Width::Byte), Just(Width::Word), Just(Width::Long)];
    let tail = prop_oneof![Just(String::new()), (0u32..100_000).prop_map(|n| format!("_{n}"))];
    (area, width, 0u32..100_000, proptest::option::of(0u8..8), tail).prop_map(|(area, width, byte, bit, tail)| {
        IoName {
            area,
            width,
            byte,
            bit: if width == Width::Bit { bit } else { None },
            tail,
        }
    })
}

/// Gates over eight bit inputs and earlier gates: (is_and, [(source, inverted)]).
/// Sources below 8 are inputs, the rest index earlier gates.
fn arb_gate_network() -> impl Strategy<Value = Vec<(bool, Vec<(usize, bool)>)>> {
    (1usize..16).prop_flat_map(|n| {
        (0..n)
            .map(|k| {
                (
                    any::<bool>(),
                    prop::collection::vec((0..8 + k, any::<bool>()), 0..6),
                )
            })
            .collect::<Vec<_>>()
    })
}

fn gate_network_text(gates: &[(bool, Vec<(usize, bool)>)], reversed: bool) -> String {
    let mut lines: Vec<String> = (0..8).map(|i| format!("{} input gate", bit_input(i))).collect();
    let mut gate_lines: Vec<String> = gates
        .iter()
        .enumerate()
        .map(|(k, (is_and, inputs))| {
            let op = if *is_and { "and" } else { "or" };
            let refs: Vec<String> = inputs
                .iter()
                .map(|&(src, inv)| {
                    let name = if src < 8 { bit_input(src) } else { format!("g{}", src - 8) };
                    input_ref(&name, inv)
                })
                .collect();
            if refs.is_empty() {
                format!("g{k} {op} gate")
            } else {
                format!("g{k} {op} gate : {}", refs.join(", "))
            }
        })
        .collect();
    if reversed {
        gate_lines.reverse();
        lines.reverse();
    }
    lines.extend(gate_lines);
    lines.join("\n") + "\n"
}

/// A gate width and the inversion flags of a gate that one level of
/// splitting can hold at that width.
fn arb_split_case() -> impl Strategy<Value = (usize, Vec<bool>)> {
    (2usize..24).prop_flat_map(|width| {
        let most = (width * width / 2).clamp(1, 199);
        (Just(width), prop::collection::vec(any::<bool>(), 1..=most))
    })
}

// ── Property tests ──────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    /// Every structured name prints back to a string that decodes to itself.
    #[test]
    fn io_names_round_trip(io in arb_io_name()) {
        let text = name::encode(&io);
        prop_assert_eq!(name::decode(&text), Some(io));
    }

    /// Mangled constants and bit names unmangle to the original.
    #[test]
    fn mangling_round_trips(value in any::<i64>(), byte in 0u32..1000, bit in 0u8..8, tail in proptest::option::of(0u32..100)) {
        let number = value.to_string();
        prop_assert_eq!(name::unmangle(&name::mangle(&number)), number);

        let bit_name = match tail {
            Some(t) => format!("QX{byte}.{bit}_{t}"),
            None => format!("IX{byte}.{bit}"),
        };
        let ident = name::mangle(&bit_name);
        prop_assert!(!ident.contains('.'));
        prop_assert_eq!(name::unmangle(&ident), bit_name);
    }

    /// A chain of aliases resolves to the root with the XOR of its
    /// inversions, and every alias on it then points at the root directly.
    #[test]
    fn alias_chains_flatten(inversions in prop::collection::vec(any::<bool>(), 0..20)) {
        let mut net = Network::new();
        let m = net.add_module("m");
        let root = net.add_node(m, Node::input_bit("IX0.0"));
        let mut prev = root;
        let mut chain = Vec::new();
        for (k, &inv) in inversions.iter().enumerate() {
            let a = net.add_node(m, Node::new(format!("n{k}"), NodeKind::Alias, Role::Gate));
            net.set_alias(a, prev, inv);
            chain.push(a);
            prev = a;
        }

        let parity = inversions.iter().fold(false, |acc, &inv| acc ^ inv);
        let resolved = alias::resolve(&mut net.nodes, prev).unwrap();
        prop_assert_eq!(resolved.node, root);
        prop_assert_eq!(resolved.invert, parity);

        for &a in &chain {
            let target = net.node(a).alias.unwrap().target;
            prop_assert_eq!(target, root);
        }
    }

    /// A gate split at any width computes the same function as the
    /// original, and afterwards no gate has more inputs than the width.
    #[test]
    fn split_gates_keep_their_function(
        is_and in any::<bool>(),
        (width, inverted) in arb_split_case(),
        values in prop::collection::vec(any::<u8>(), 25),
    ) {
        let n = inverted.len();
        prop_assume!(n <= width || split::plan(n, width).is_some());

        let mut text: String = (0..n).map(|i| format!("{} input gate\n", bit_input(i))).collect();
        let refs: Vec<String> = inverted.iter().enumerate().map(|(i, &inv)| input_ref(&bit_input(i), inv)).collect();
        let op = if is_and { "and" } else { "or" };
        text.push_str(&format!("G {op} gate : {}\n", refs.join(", ")));
        let options = LinkOptions { gate_width: width, ..LinkOptions::default() };
        let net = link_text(&text, options);

        for s in net.symbols().iter() {
            prop_assert!(net.node(s).counts.fan_in as usize <= width, "{} over width", net.name(s));
        }

        let mut sim = Interpreter::new();
        sim.run(&net).unwrap();
        for byte in 0..n.div_ceil(8) {
            sim.set_byte(&net, &format!("IX{byte}"), values[byte]).unwrap();
        }
        let seen: Vec<bool> = inverted
            .iter()
            .enumerate()
            .map(|(i, &inv)| ((values[i / 8] >> (i % 8)) & 1 == 1) != inv)
            .collect();
        let expected = if is_and { seen.iter().all(|&v| v) } else { seen.iter().any(|&v| v) };
        prop_assert_eq!(sim.value(&net, "G"), Some(i64::from(expected)));
    }

    /// Every arena slot is written, each list is as long as its fan-out
    /// plus terminators, and each input edge shows up in its source's list.
    #[test]
    fn arena_mirrors_input_lists(gates in arb_gate_network()) {
        let net = link_text(&gate_network_text(&gates, false), LinkOptions::default());

        prop_assert_eq!(net.arena().len(), net.stats().links);
        prop_assert!(net.arena().iter().all(|s| *s != Slot::Vacant));

        for s in net.symbols().iter() {
            let node = net.node(s);
            if let Some(slice) = node.slice {
                let terminators = node.role.terminators().unwrap();
                prop_assert_eq!(slice.len, node.counts.fan_out as usize + terminators);
                prop_assert_eq!(net.activity(s).len(), node.counts.fan_out as usize);
            }
        }

        for (k, (_, inputs)) in gates.iter().enumerate() {
            let gate = net.lookup(&format!("g{k}")).unwrap();
            for &(src, inv) in inputs {
                let name = if src < 8 { bit_input(src) } else { format!("g{}", src - 8) };
                let act = net.activity(net.lookup(&name).unwrap());
                let found = if inv { act.inverted().any(|c| c == gate) } else { act.normal().any(|c| c == gate) };
                prop_assert!(found, "{} -> g{} missing", name, k);
            }
        }
    }

    /// The sorted symbol table depends only on the names, not on the order
    /// nodes were declared in.
    #[test]
    fn symbol_order_is_declaration_independent(gates in arb_gate_network()) {
        let forward = link_text(&gate_network_text(&gates, false), LinkOptions::default());
        let backward = link_text(&gate_network_text(&gates, true), LinkOptions::default());

        let names = |net: &LinkedNetwork| -> Vec<String> {
            net.symbols().iter().map(|s| net.name(s).to_string()).collect()
        };
        let a = names(&forward);
        prop_assert!(a.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(&a, &names(&backward));
        prop_assert_eq!(forward.arena().len(), backward.arena().len());
    }
}

// ── Fixed cases ─────────────────────────────────────────────────────────────

#[test]
fn common_io_names_round_trip() {
    let cases = [
        ("IX3.7", Area::Input, Width::Bit, 3, Some(7)),
        ("QB1", Area::Output, Width::Byte, 1, None),
        ("TX0", Area::Timer, Width::Bit, 0, None),
        ("QL4", Area::Output, Width::Long, 4, None),
        ("IW2", Area::Input, Width::Word, 2, None),
    ];
    for (text, area, width, byte, bit) in cases {
        let io = name::decode(text).unwrap_or_else(|| panic!("'{text}' does not decode"));
        assert_eq!((io.area, io.width, io.byte, io.bit), (area, width, byte, bit), "{text}");
        assert!(io.tail.is_empty(), "{text}");
        assert_eq!(name::encode(&io), text);
    }
}

#[test]
fn alias_chains_of_zero_one_and_ten() {
    for n in [0usize, 1, 10] {
        let mut text = String::from("IX0.0 input gate\n");
        let mut prev = String::from("IX0.0");
        for k in 0..n {
            text.push_str(&format!("n{k} alias gate -> ~{prev}\n"));
            prev = format!("n{k}");
        }
        text.push_str(&format!("A1 and gate : {prev}\nQX0.0 or outx : A1\n"));
        let net = link_text(&text, LinkOptions::default());

        let act = net.activity(net.lookup("IX0.0").unwrap());
        let a1 = net.lookup("A1").unwrap();
        if n % 2 == 1 {
            assert_eq!(act.inverted().collect::<Vec<_>>(), vec![a1], "n = {n}");
            assert_eq!(act.normal().count(), 0);
        } else {
            assert_eq!(act.normal().collect::<Vec<_>>(), vec![a1], "n = {n}");
            assert_eq!(act.inverted().count(), 0);
        }
    }
}

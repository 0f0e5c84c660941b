use clap::Parser;
use std::path::PathBuf;

use gatelink::linked::Backend;
use gatelink::pass::PassId;
use gatelink::pipeline::{LinkOptions, LinkState};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    /// Link and report diagnostics only
    Check,
    /// Node and link totals after counting and splitting
    Counts,
    Listing,
    Symbols,
    Json,
    Dot,
    C,
}

#[derive(Parser, Debug)]
#[command(
    name = "gatelink",
    version,
    about = "Network linker for reactive control-logic modules"
)]
struct Cli {
    /// Object files (.gnl) to link, in module order
    #[arg(required = true)]
    objects: Vec<PathBuf>,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Check)]
    emit: EmitStage,

    /// Largest fan-in of an AND/OR gate; wider gates are split
    #[arg(long, default_value_t = 127, value_parser = clap::value_parser!(u64).range(2..))]
    gate_width: u64,

    /// Errors tolerated before the link is aborted
    #[arg(long, default_value_t = 100)]
    max_errors: usize,

    /// Size of the I/O address space in bytes
    #[arg(long, default_value_t = 64)]
    io_bytes: u32,

    /// Print link passes and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        for path in &cli.objects {
            eprintln!("gatelink: object = {}", path.display());
        }
        eprintln!("gatelink: emit   = {:?}", cli.emit);
    }

    // ── Read object files ──
    let mut texts = Vec::with_capacity(cli.objects.len());
    for path in &cli.objects {
        match std::fs::read_to_string(path) {
            Ok(s) => texts.push((path.display().to_string(), s)),
            Err(e) => {
                eprintln!("gatelink: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
    }
    let sources: Vec<gatelink::load::ObjectSource<'_>> = texts
        .iter()
        .map(|(name, text)| gatelink::load::ObjectSource { name, text })
        .collect();

    // ── Load ──
    let loaded = gatelink::load::load(&sources);
    for diag in &loaded.diagnostics {
        eprintln!("gatelink: {}", diag);
    }
    if loaded.has_errors() {
        std::process::exit(2);
    }
    if cli.verbose {
        eprintln!(
            "gatelink: loaded {} modules, {} nodes",
            loaded.network.modules.len(),
            loaded.network.len()
        );
    }

    // ── Link ──
    let options = LinkOptions {
        gate_width: cli.gate_width as usize,
        max_errors: cli.max_errors,
        io_bytes: cli.io_bytes,
    };
    let terminal = match cli.emit {
        EmitStage::Counts => PassId::Split,
        _ => PassId::Validate,
    };
    let mut state = LinkState::new(loaded.network, options);
    let outcome = gatelink::pipeline::run_pipeline(&mut state, terminal, cli.verbose, |_, diags| {
        for diag in diags {
            eprintln!("gatelink: {}", diag);
        }
    });
    if let Err(e) = outcome {
        eprintln!("gatelink: error: {}", e);
        std::process::exit(e.exit_code());
    }

    if let EmitStage::Counts = cli.emit {
        let Some(totals) = &state.totals else {
            eprintln!("gatelink: error: no totals after counting");
            std::process::exit(3);
        };
        let mut out = format!("nodes {}\nlinks {}\nsplits {}\n", totals.nodes, totals.links, state.splits.len());
        for (kind, n) in &totals.per_kind {
            out.push_str(&format!("{:<8}{}\n", kind, n));
        }
        write_output(&cli, &out);
        return;
    }

    let Some((linked, diagnostics)) = state.into_linked() else {
        eprintln!("gatelink: error: link finished without all artifacts");
        std::process::exit(3);
    };
    if cli.verbose {
        eprintln!(
            "gatelink: linked {} nodes, {} links, {} I/O bindings",
            linked.stats().nodes,
            linked.stats().links,
            linked.stats().io_bindings
        );
    }

    let provenance = || gatelink::pipeline::compute_provenance(texts.iter().map(|(n, t)| (n.as_str(), t.as_str())));
    let out = match cli.emit {
        EmitStage::Check | EmitStage::Counts => return,
        EmitStage::Listing => gatelink::listing::emit_listing(&linked),
        EmitStage::Symbols => {
            let mut s = String::new();
            for id in linked.symbols().iter() {
                let node = linked.node(id);
                s.push_str(&format!("{:<12}{:<8}{}\n", node.name, node.kind.label(), node.role.label()));
            }
            s
        }
        EmitStage::Json => {
            let p = provenance();
            let summary = gatelink::summary::summarize(&linked, &p, &diagnostics);
            match serde_json::to_string_pretty(&summary) {
                Ok(mut s) => {
                    s.push('\n');
                    s
                }
                Err(e) => {
                    eprintln!("gatelink: error: {}", e);
                    std::process::exit(3);
                }
            }
        }
        EmitStage::Dot => gatelink::dot::emit_dot(&linked),
        EmitStage::C => gatelink::emit_c::CEmitter::new()
            .with_provenance(provenance())
            .run(&linked),
    };
    write_output(&cli, &out);
}

fn write_output(cli: &Cli, out: &str) {
    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, out) {
                eprintln!("gatelink: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
            if cli.verbose {
                eprintln!("gatelink: wrote {}", path.display());
            }
        }
        None => print!("{}", out),
    }
}

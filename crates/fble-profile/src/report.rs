//! Text profile report (spec.md section 4.7), grounded on
//! `examples/original_source/lib/profile.c`'s `FbleProfileReport`: coverage,
//! two flat profiles (by total time, by self time), and a call-graph
//! section per covered block.

use std::fmt::Write as _;

use crate::Profile;

pub(crate) fn render(profile: &Profile) -> String {
    let blocks = profile.blocks.borrow();
    let mut out = String::new();

    let covered: Vec<usize> = (0..blocks.len()).filter(|&i| blocks[i].count > 0).collect();
    let _ = writeln!(
        out,
        "Coverage: {} / {} blocks ({:.1}%)",
        covered.len(),
        blocks.len(),
        100.0 * covered.len() as f64 / blocks.len().max(1) as f64
    );
    out.push('\n');

    // Total time per block: self time plus every outgoing edge's call
    // time (spec.md section 4.7: "total" includes time spent in callees).
    let total_time = |i: usize| -> u64 { blocks[i].time + blocks[i].calls.iter().map(|c| c.time).sum::<u64>() };

    out.push_str("Flat Profile by Overall Time\n");
    out.push_str("count     time      block\n");
    let mut by_total = covered.clone();
    by_total.sort_by(|&a, &b| total_time(b).cmp(&total_time(a)));
    for i in by_total {
        let _ = writeln!(out, "{:<9} {:<9} {}", blocks[i].count, total_time(i), blocks[i].name);
    }
    out.push('\n');

    out.push_str("Flat Profile by Self Time\n");
    out.push_str("count     time      block\n");
    let mut by_self = covered.clone();
    by_self.sort_by(|&a, &b| blocks[b].time.cmp(&blocks[a].time));
    for i in by_self {
        let _ = writeln!(out, "{:<9} {:<9} {}", blocks[i].count, blocks[i].time, blocks[i].name);
    }
    out.push('\n');

    out.push_str("Call Graph\n");
    for &i in &covered {
        // Callers: every other block with an edge into `i`.
        let mut callers: Vec<(usize, u64, u64)> = Vec::new();
        for (j, b) in blocks.iter().enumerate() {
            if let Some(edge) = b.calls.iter().find(|c| c.callee == i as u32) {
                callers.push((j, edge.count, edge.time));
            }
        }
        callers.sort_by_key(|&(j, ..)| j);

        let mut callees: Vec<(usize, u64, u64)> =
            blocks[i].calls.iter().map(|c| (c.callee as usize, c.count, c.time)).collect();
        callees.sort_by(|a, b| b.2.cmp(&a.2));

        for (j, count, time) in &callers {
            let _ = writeln!(out, "  {:<9} {:<9} {}", count, time, blocks[*j].name);
        }
        let _ = writeln!(out, "* {:<9} {:<9} {}", blocks[i].count, total_time(i), blocks[i].name);
        for (j, count, time) in &callees {
            let _ = writeln!(out, "  {:<9} {:<9} {}", count, time, blocks[*j].name);
        }
        out.push_str("-------------------------------------------------------------------------------\n");
    }
    out.push('\n');

    out.push_str("Block Locations\n");
    for &i in &covered {
        let _ = writeln!(out, "{}\t{}", blocks[i].name, blocks[i].name.loc);
    }

    out
}

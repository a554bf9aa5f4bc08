//! Plain-text rendering of a calculation result.

use std::fmt::Write;

use relicalc::engine::CalculationResult;

pub fn render(result: &CalculationResult) -> String {
  let mut out = String::new();
  let meta = &result.metadata;

  let _ = writeln!(out, "Attack multiplier: {:.2}", result.total);
  if meta.tier.is_approximate() {
    let _ = writeln!(out, "  (approximate: {} tier)", meta.tier);
  }
  let _ = writeln!(out);
  let _ = writeln!(out, "  base           {:>8.2}", result.base);
  let _ = writeln!(out, "  synergy        {:>8.2}", result.synergy);
  let _ = writeln!(out, "  conditional    {:>8.2}", result.conditional);
  let _ = writeln!(out, "  environmental  {:>8.2}", result.environmental);
  for penalty in &result.penalties {
    let _ = writeln!(out, "  - {:<13}{:>8.2}", penalty.reason, penalty.amount);
  }
  let _ = writeln!(
    out,
    "  efficiency     {:>8.2}  (avg difficulty {:.1})",
    result.efficiency, result.average_difficulty
  );

  if !result.relic_breakdown.is_empty() {
    let _ = writeln!(out);
    let _ = writeln!(out, "Relics:");
    for relic in &result.relic_breakdown {
      let _ = writeln!(
        out,
        "  {:<20} base {:>6.2}  conditional {:>6.2}",
        relic.name, relic.base, relic.conditional
      );
    }
  }

  if let Some(trace) = &result.trace {
    let _ = writeln!(out);
    let _ = writeln!(out, "Trace:");
    for step in trace {
      let _ = writeln!(
        out,
        "  [{:<13}] {:<40} {:>8.4}",
        step.phase.as_str(),
        step.description,
        step.running_total
      );
    }
  }

  let _ = writeln!(out);
  let _ = write!(
    out,
    "{} tier, {} effects evaluated in {:.2}ms{}",
    meta.tier,
    meta.effects_evaluated,
    meta.duration_ms,
    if meta.offline { ", offline" } else { "" }
  );
  out
}

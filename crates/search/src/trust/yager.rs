//! Yager's rule of combination
//!
//! Opinions are read as mass functions on the binary frame {skill, ¬skill}:
//! m(skill) = b, m(¬skill) = d, m(Θ) = u. The conjunctive combination is
//! folded over all sources while the conflict mass m(∅) is tracked; Yager's
//! rule then moves all of m(∅) into m(Θ) instead of normalising it away.

use super::opinion::Opinion;

/// Running conjunctive combination
#[derive(Debug, Clone, Copy)]
struct Conjunction {
    belief: f64,
    disbelief: f64,
    uncertainty: f64,
    conflict: f64,
}

impl Conjunction {
    fn vacuous() -> Self {
        Self {
            belief: 0.0,
            disbelief: 0.0,
            uncertainty: 1.0,
            conflict: 0.0,
        }
    }

    fn absorb(self, o: &Opinion) -> Self {
        Self {
            belief: self.belief * (o.belief + o.uncertainty) + self.uncertainty * o.belief,
            disbelief: self.disbelief * (o.disbelief + o.uncertainty) + self.uncertainty * o.disbelief,
            uncertainty: self.uncertainty * o.uncertainty,
            conflict: self.conflict + self.belief * o.disbelief + self.disbelief * o.belief,
        }
    }
}

/// Mean base rate of the opinions that carry evidence.
///
/// Vacuous opinions say nothing about the prior either, so they only count
/// when every input is vacuous.
fn fused_base_rate(opinions: &[&Opinion]) -> Option<f64> {
    let mean = |rates: Vec<f64>| {
        if rates.is_empty() {
            None
        } else {
            Some(rates.iter().sum::<f64>() / rates.len() as f64)
        }
    };
    let evidential = opinions
        .iter()
        .filter(|o| o.uncertainty < 1.0)
        .map(|o| o.base_rate)
        .collect();
    mean(evidential).or_else(|| mean(opinions.iter().map(|o| o.base_rate).collect()))
}

/// Pairwise Yager combination
pub fn combine(a: &Opinion, b: &Opinion) -> Opinion {
    let conflict = a.belief * b.disbelief + a.disbelief * b.belief;
    let belief = a.belief * b.belief + a.belief * b.uncertainty + a.uncertainty * b.belief;
    let disbelief =
        a.disbelief * b.disbelief + a.disbelief * b.uncertainty + a.uncertainty * b.disbelief;
    let uncertainty = a.uncertainty * b.uncertainty + conflict;
    let base_rate = fused_base_rate(&[a, b]).unwrap_or(a.base_rate);
    Opinion::clamped(belief, disbelief, uncertainty, base_rate)
}

/// Fuse any number of opinions with the N-source Yager rule.
///
/// The input is sorted into a canonical order first, so every permutation
/// of the same opinions yields a bit-identical result. An empty input
/// yields the vacuous opinion with `base_rate`, which is also the fallback
/// prior when no input carries one.
pub fn fuse(opinions: &[Opinion], base_rate: f64) -> Opinion {
    if opinions.is_empty() {
        return Opinion::vacuous(base_rate);
    }

    let mut ordered: Vec<&Opinion> = opinions.iter().collect();
    ordered.sort_by(|x, y| x.canonical_cmp(y));

    let fused = ordered
        .iter()
        .fold(Conjunction::vacuous(), |acc, o| acc.absorb(o));
    let fused_rate = fused_base_rate(&ordered).unwrap_or(base_rate);

    Opinion::clamped(
        fused.belief,
        fused.disbelief,
        fused.uncertainty + fused.conflict,
        fused_rate,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(b: f64, d: f64, u: f64) -> Opinion {
        Opinion::new(b, d, u, 0.5).unwrap()
    }

    fn assert_close(a: &Opinion, b: &Opinion) {
        assert!((a.belief - b.belief).abs() < 1e-12, "{:?} vs {:?}", a, b);
        assert!((a.disbelief - b.disbelief).abs() < 1e-12, "{:?} vs {:?}", a, b);
        assert!((a.uncertainty - b.uncertainty).abs() < 1e-12, "{:?} vs {:?}", a, b);
    }

    #[test]
    fn test_vacuous_is_identity() {
        let o = op(0.6, 0.1, 0.3);
        assert_eq!(fuse(&[o, Opinion::vacuous(0.5)], 0.5), o);
        assert_close(&combine(&o, &Opinion::vacuous(0.5)), &o);
    }

    #[test]
    fn test_vacuous_keeps_base_rate() {
        let o = Opinion::new(0.6, 0.1, 0.3, 0.2).unwrap();
        let fused = fuse(&[o, Opinion::vacuous(0.5)], 0.5);
        assert_eq!(fused, o);
        assert_eq!(fused.plausibility(), o.plausibility());

        let pair = combine(&Opinion::vacuous(0.9), &o);
        assert_close(&pair, &o);
        assert_eq!(pair.base_rate, 0.2);
    }

    #[test]
    fn test_base_rate_of_evidence_is_averaged() {
        let a = Opinion::new(0.5, 0.0, 0.5, 0.2).unwrap();
        let b = Opinion::new(0.3, 0.2, 0.5, 0.6).unwrap();
        assert!((fuse(&[a, b, Opinion::vacuous(1.0)], 0.5).base_rate - 0.4).abs() < 1e-12);
        assert_eq!(fuse(&[Opinion::vacuous(0.3), Opinion::vacuous(0.3)], 0.5).base_rate, 0.3);
    }

    #[test]
    fn test_total_conflict_becomes_uncertainty() {
        let fused = fuse(&[op(1.0, 0.0, 0.0), op(0.0, 1.0, 0.0)], 0.5);
        assert_eq!(fused.belief, 0.0);
        assert_eq!(fused.disbelief, 0.0);
        assert_eq!(fused.uncertainty, 1.0);

        let pair = combine(&op(1.0, 0.0, 0.0), &op(0.0, 1.0, 0.0));
        assert_eq!(pair.uncertainty, 1.0);
    }

    #[test]
    fn test_empty_input_is_vacuous() {
        assert!(fuse(&[], 0.5).is_vacuous());
    }

    #[test]
    fn test_fuse_matches_pairwise_for_two() {
        let a = op(0.7, 0.1, 0.2);
        let b = op(0.2, 0.3, 0.5);
        assert_close(&fuse(&[a, b], 0.5), &combine(&a, &b));
    }

    #[test]
    fn test_agreeing_evidence_strengthens_belief() {
        let a = op(0.6, 0.0, 0.4);
        let fused = fuse(&[a, a, a], 0.5);
        assert!(fused.belief > a.belief);
        assert!(fused.uncertainty < a.uncertainty);
        // 1 - 0.4^3
        assert!((fused.belief - 0.936).abs() < 1e-12);
    }

    #[test]
    fn test_fused_masses_sum_to_one() {
        let fused = fuse(&[op(0.5, 0.3, 0.2), op(0.1, 0.6, 0.3), op(0.4, 0.4, 0.2)], 0.5);
        let total = fused.belief + fused.disbelief + fused.uncertainty;
        assert!((total - 1.0).abs() < 1e-12);
    }
}

use lazy_static::lazy_static;
use log::warn;
use rand::Rng;

use crate::catalogue::{all_known_chords, notes_of};
use crate::chord::ExplodedChord;
use crate::error::{Error, Result};
use crate::flavour::{ChordSelector, Flavour};
use crate::keys::{
    chords_matching_scale, keys_containing_chord, scale_notes, ChordAndAccidentals,
    KeySearchOptions, ScaleName,
};
use crate::note::note_name_equals;
use crate::triads::classify;

/// Upper bound on "generate a chord, hope it has a home key" attempts.
/// A handful of catalogued chords (augmented shapes) fit no major-derived
/// key, so the loop must not run unbounded.
pub const MAX_KEY_RETRIES: usize = 50;

/// Per-entry constraint on where a regenerated chord may come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceSet {
    /// Every note diatonic to the current key.
    #[default]
    StrictInKey,
    /// At most one out-of-key note.
    LooseInKey,
    /// Same root pitch class and base triad as chord 0, extensions free.
    SameTriad,
    /// Ignore the key entirely.
    AnyChord,
}

/// One slot in the generated sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordChoice {
    pub chord: ExplodedChord,
    pub locked: bool,
    pub variant: usize,
    pub source_set: SourceSet,
}

impl Default for ChordChoice {
    fn default() -> Self {
        ChordChoice {
            chord: ExplodedChord::new("C", "major"),
            locked: false,
            variant: 0,
            source_set: SourceSet::default(),
        }
    }
}

/// The whole state of one prompt generation. Operations never mutate a
/// context in place: they take it by reference and return a fresh one, so a
/// failed attempt leaves the caller's state exactly as it was.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationContext {
    pub chords: Vec<ChordChoice>,
    pub key_name: ScaleName,
    pub key_locked: bool,
    pub flavour: Flavour,
}

impl GenerationContext {
    /// A fresh unlocked context of `length` default entries; callers are
    /// expected to [`shuffle_all`] before showing it to anyone.
    pub fn new(length: usize, flavour: Flavour) -> Self {
        GenerationContext {
            chords: vec![ChordChoice::default(); length],
            key_name: "C major".to_string(),
            key_locked: false,
            flavour,
        }
    }
}

lazy_static! {
    /// The whole catalogue as a candidate set, for key-free generation.
    static ref UNCONSTRAINED: Vec<ChordAndAccidentals> = all_known_chords()
        .iter()
        .map(|chord| ChordAndAccidentals {
            chord: chord.clone(),
            accidental_degrees: Vec::new(),
        })
        .collect();
}

/// Candidates an entry may regenerate from, given its source set, the
/// current key, and chord 0 (for the same-triad constraint).
fn candidate_pool(
    source_set: SourceSet,
    key_name: &str,
    first_chord: &ExplodedChord,
) -> Result<Vec<ChordAndAccidentals>> {
    if source_set == SourceSet::AnyChord {
        return Ok(UNCONSTRAINED.clone());
    }
    let scale = scale_notes(key_name).ok_or_else(|| Error::KeyMismatch {
        key: key_name.to_string(),
    })?;
    let strict = chords_matching_scale(&scale, Some(0));
    match source_set {
        SourceSet::AnyChord => unreachable!(),
        SourceSet::LooseInKey => Ok(chords_matching_scale(&scale, Some(1)).to_vec()),
        SourceSet::StrictInKey => Ok(strict.to_vec()),
        SourceSet::SameTriad => {
            let triad = classify(&first_chord.suffix);
            let same: Vec<ChordAndAccidentals> = strict
                .iter()
                .filter(|c| {
                    note_name_equals(&c.chord.root, &first_chord.root)
                        && classify(&c.chord.suffix) == triad
                })
                .cloned()
                .collect();
            if same.is_empty() {
                // unsatisfiable; degrade to strict-in-key rather than fail
                warn!(
                    "no {key_name} candidates share the base triad of {:?}, dropping constraint",
                    first_chord
                );
                Ok(strict.to_vec())
            } else {
                Ok(same)
            }
        }
    }
}

/// Pick one chord from `pool` under `flavour`, avoiding chords already used
/// in the sequence when enough candidates remain.
fn pick<R: Rng>(
    flavour: &Flavour,
    pool: &[ChordAndAccidentals],
    avoid: &[ExplodedChord],
    rng: &mut R,
) -> Result<ExplodedChord> {
    let fresh: Vec<ChordAndAccidentals> = pool
        .iter()
        .filter(|c| !avoid.contains(&c.chord))
        .cloned()
        .collect();
    let selector = match ChordSelector::build(flavour, &fresh) {
        Ok(selector) => selector,
        // duplicates were all we had left; allow them over failing
        Err(_) if fresh.len() < pool.len() => ChordSelector::build(flavour, pool)?,
        Err(e) => return Err(e),
    };
    Ok(selector.choose(rng).chord.clone())
}

fn regenerate_entry<R: Rng>(
    next: &mut GenerationContext,
    index: usize,
    rng: &mut R,
) -> Result<()> {
    let first_chord = next.chords[0].chord.clone();
    let pool = candidate_pool(next.chords[index].source_set, &next.key_name, &first_chord)?;
    // every other slot counts, locked entries later in the sequence included
    let avoid: Vec<ExplodedChord> = next
        .chords
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != index)
        .map(|(_, entry)| entry.chord.clone())
        .collect();
    next.chords[index].chord = pick(&next.flavour, &pool, &avoid, rng)?;
    next.chords[index].variant = 0;
    Ok(())
}

/// Regenerate the whole sequence.
///
/// Key unlocked: chord 0 is generated unconstrained, then a key is drawn
/// from its compatible set, retrying chord 0 up to [`MAX_KEY_RETRIES`] times
/// when it has no diatonic home. Key locked: the key stays and every
/// non-locked entry (chord 0 included) is generated inside it. Locked
/// entries are always carried over unchanged.
pub fn shuffle_all<R: Rng>(ctx: &GenerationContext, rng: &mut R) -> Result<GenerationContext> {
    let mut next = ctx.clone();
    if next.chords.is_empty() {
        return Ok(next);
    }

    if !ctx.key_locked {
        let (first_chord, key) = derive_key(ctx, rng)?;
        if !ctx.chords[0].locked {
            next.chords[0].chord = first_chord;
            next.chords[0].variant = 0;
        }
        next.key_name = key;
    }

    let start = usize::from(!ctx.key_locked);
    for index in start..next.chords.len() {
        if !next.chords[index].locked {
            regenerate_entry(&mut next, index, rng)?;
        }
    }
    Ok(next)
}

/// Chord-first key derivation: generate (or reuse a locked) chord 0, then
/// draw a key containing it, with a bounded retry for homeless chords.
fn derive_key<R: Rng>(
    ctx: &GenerationContext,
    rng: &mut R,
) -> Result<(ExplodedChord, ScaleName)> {
    for _ in 0..MAX_KEY_RETRIES {
        let first_chord = if ctx.chords[0].locked {
            ctx.chords[0].chord.clone()
        } else {
            pick(&ctx.flavour, &UNCONSTRAINED, &[], rng)?
        };
        let notes = notes_of(&first_chord, 0)?;
        let keys = keys_containing_chord(&first_chord, &notes, &KeySearchOptions::default());
        if keys.is_empty() {
            if ctx.chords[0].locked {
                // retrying cannot help, the chord never changes
                return Err(Error::NoCompatibleKey { attempts: 1 });
            }
            continue;
        }
        let key = keys[rng.gen_range(0..keys.len())].clone();
        return Ok((first_chord, key));
    }
    Err(Error::NoCompatibleKey {
        attempts: MAX_KEY_RETRIES,
    })
}

/// Replace one entry's chord identity. A no-op (the input context comes back
/// unchanged) when the replacement equals the current chord.
///
/// Changing chord 0 under an unlocked key is the causality ripple: the key
/// is re-derived (kept when still compatible), then every later non-locked
/// entry is kept if still a valid candidate for its source set and
/// regenerated otherwise.
pub fn set_chord<R: Rng>(
    ctx: &GenerationContext,
    index: usize,
    chord: ExplodedChord,
    rng: &mut R,
) -> Result<GenerationContext> {
    let entry = ctx.chords.get(index).ok_or(Error::NoSuchEntry {
        index,
        len: ctx.chords.len(),
    })?;
    if entry.chord == chord {
        return Ok(ctx.clone());
    }
    let mut next = ctx.clone();
    next.chords[index].chord = chord.clone();
    next.chords[index].variant = 0;

    if index == 0 && !ctx.key_locked {
        let notes = notes_of(&chord, 0)?;
        let keys = keys_containing_chord(&chord, &notes, &KeySearchOptions::default());
        if keys.is_empty() {
            return Err(Error::NoCompatibleKey { attempts: 1 });
        }
        if !keys.contains(&next.key_name) {
            next.key_name = keys[rng.gen_range(0..keys.len())].clone();
        }
        for i in 1..next.chords.len() {
            if next.chords[i].locked {
                continue;
            }
            let pool = candidate_pool(next.chords[i].source_set, &next.key_name, &chord)?;
            let still_valid = pool.iter().any(|c| c.chord == next.chords[i].chord);
            if !still_valid {
                regenerate_entry(&mut next, i, rng)?;
            }
        }
    }
    Ok(next)
}

/// Change the key directly. Permitted when the key is locked, or when it is
/// unlocked and the new key is one of chord 0's compatible keys (chord 0
/// determines the key in that mode, so an arbitrary key would break
/// causality). Regenerates every non-locked entry the key governs.
pub fn set_key<R: Rng>(
    ctx: &GenerationContext,
    key_name: &str,
    rng: &mut R,
) -> Result<GenerationContext> {
    let mismatch = || Error::KeyMismatch {
        key: key_name.to_string(),
    };
    match ctx.chords.first() {
        // with no chord 0 there is nothing to anchor causality to, so any
        // well-formed key is acceptable (as it is when the key is locked)
        Some(first) if !ctx.key_locked => {
            let notes = notes_of(&first.chord, 0)?;
            let keys = keys_containing_chord(&first.chord, &notes, &KeySearchOptions::default());
            if !keys.iter().any(|k| k == key_name) {
                return Err(mismatch());
            }
        }
        _ => {
            scale_notes(key_name).ok_or_else(mismatch)?;
        }
    }

    let mut next = ctx.clone();
    next.key_name = key_name.to_string();
    let start = usize::from(!ctx.key_locked);
    for index in start..next.chords.len() {
        if !next.chords[index].locked {
            regenerate_entry(&mut next, index, rng)?;
        }
    }
    Ok(next)
}

/// Swap the selection policy. A weighting change invalidates every prior
/// candidate ranking, so this is a full reshuffle under the new flavour.
pub fn set_flavour<R: Rng>(
    ctx: &GenerationContext,
    flavour: Flavour,
    rng: &mut R,
) -> Result<GenerationContext> {
    let mut next = ctx.clone();
    next.flavour = flavour;
    shuffle_all(&next, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triads::{classify, MAJOR_TRIAD};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const PLAIN: Flavour = Flavour {
        name: "plain",
        weighting: None,
        whitelist: None,
        blacklist: None,
    };

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn in_key(chord: &ExplodedChord, key_name: &str) -> bool {
        let scale = scale_notes(key_name).unwrap();
        chords_matching_scale(&scale, Some(0))
            .iter()
            .any(|c| &c.chord == chord)
    }

    #[test]
    fn shuffle_fills_every_slot_with_in_key_chords() {
        let _ = env_logger::builder().is_test(true).try_init();
        let ctx = GenerationContext::new(4, PLAIN);
        let next = shuffle_all(&ctx, &mut rng(1)).unwrap();
        assert_eq!(next.chords.len(), 4);
        let notes = notes_of(&next.chords[0].chord, 0).unwrap();
        let keys =
            keys_containing_chord(&next.chords[0].chord, &notes, &KeySearchOptions::default());
        assert!(keys.contains(&next.key_name));
        for entry in &next.chords[1..] {
            assert!(in_key(&entry.chord, &next.key_name), "{:?}", entry.chord);
        }
        // input context untouched
        assert_eq!(ctx, GenerationContext::new(4, PLAIN));
    }

    #[test]
    fn locked_key_survives_a_shuffle() {
        let mut ctx = GenerationContext::new(3, PLAIN);
        ctx.key_name = "Eb major".to_string();
        ctx.key_locked = true;
        let next = shuffle_all(&ctx, &mut rng(2)).unwrap();
        assert_eq!(next.key_name, "Eb major");
        for entry in &next.chords {
            assert!(in_key(&entry.chord, "Eb major"));
        }
    }

    #[test]
    fn locked_entries_are_carried_over() {
        let mut ctx = GenerationContext::new(3, PLAIN);
        ctx.chords[1].chord = ExplodedChord::new("Bb", "m9");
        ctx.chords[1].locked = true;
        let next = shuffle_all(&ctx, &mut rng(3)).unwrap();
        assert_eq!(next.chords[1].chord, ExplodedChord::new("Bb", "m9"));
        assert!(next.chords[1].locked);
    }

    #[test]
    fn source_sets_constrain_each_entry() {
        let mut ctx = GenerationContext::new(4, PLAIN);
        // pin chord 0 so the same-triad constraint is satisfiable
        ctx.chords[0].chord = ExplodedChord::new("C", "major");
        ctx.chords[0].locked = true;
        ctx.chords[1].source_set = SourceSet::SameTriad;
        ctx.chords[2].source_set = SourceSet::AnyChord;
        ctx.chords[3].source_set = SourceSet::LooseInKey;
        let next = shuffle_all(&ctx, &mut rng(4)).unwrap();

        let first = &next.chords[0].chord;
        let same = &next.chords[1].chord;
        assert!(note_name_equals(&same.root, &first.root));
        assert_eq!(classify(&same.suffix), classify(&first.suffix));
        assert_eq!(classify(&same.suffix), Some(MAJOR_TRIAD));

        let scale = scale_notes(&next.key_name).unwrap();
        let loose = chords_matching_scale(&scale, Some(1));
        assert!(loose.iter().any(|c| c.chord == next.chords[3].chord));
    }

    #[test]
    fn noop_modification_is_identity() {
        let ctx = shuffle_all(&GenerationContext::new(3, PLAIN), &mut rng(5)).unwrap();
        let current = ctx.chords[1].chord.clone();
        let next = set_chord(&ctx, 1, current, &mut rng(6)).unwrap();
        assert_eq!(next, ctx);
    }

    #[test]
    fn changing_chord_zero_ripples_through_key_and_entries() {
        let mut ctx = GenerationContext::new(3, PLAIN);
        ctx.key_name = "C major".to_string();
        ctx.chords[0].chord = ExplodedChord::new("C", "major");
        ctx.chords[1].chord = ExplodedChord::new("G", "major");
        ctx.chords[2].chord = ExplodedChord::new("A", "minor");
        ctx.chords[2].locked = true;

        let replacement = ExplodedChord::new("F#", "major");
        let next = set_chord(&ctx, 0, replacement.clone(), &mut rng(7)).unwrap();

        assert_eq!(next.chords[0].chord, replacement);
        let notes = notes_of(&replacement, 0).unwrap();
        let keys = keys_containing_chord(&replacement, &notes, &KeySearchOptions::default());
        assert_ne!(next.key_name, "C major");
        assert!(keys.contains(&next.key_name));
        // non-locked entry revalidated against the new key
        assert!(in_key(&next.chords[1].chord, &next.key_name));
        // locked entry untouched even if now out of key
        assert_eq!(next.chords[2].chord, ExplodedChord::new("A", "minor"));
    }

    #[test]
    fn chord_zero_keeps_a_still_compatible_key() {
        let mut ctx = GenerationContext::new(2, PLAIN);
        ctx.key_name = "C major".to_string();
        ctx.chords[0].chord = ExplodedChord::new("C", "major");
        ctx.chords[1].chord = ExplodedChord::new("F", "major");
        // A minor's triad is diatonic to C major, so the key survives
        let next = set_chord(&ctx, 0, ExplodedChord::new("A", "minor"), &mut rng(8)).unwrap();
        assert_eq!(next.key_name, "C major");
        assert_eq!(next.chords[1].chord, ExplodedChord::new("F", "major"));
    }

    #[test]
    fn set_key_rejects_keys_foreign_to_chord_zero() {
        let mut ctx = GenerationContext::new(2, PLAIN);
        ctx.key_name = "C major".to_string();
        ctx.chords[0].chord = ExplodedChord::new("C", "major");
        assert!(matches!(
            set_key(&ctx, "B major", &mut rng(9)),
            Err(Error::KeyMismatch { .. })
        ));
        // F major contains the C major triad, so it is a legal pick
        let next = set_key(&ctx, "F major", &mut rng(10)).unwrap();
        assert_eq!(next.key_name, "F major");
        assert_eq!(next.chords[0].chord, ExplodedChord::new("C", "major"));
        assert!(in_key(&next.chords[1].chord, "F major"));
    }

    #[test]
    fn set_key_with_locked_key_regenerates_everything_unlocked() {
        let mut ctx = GenerationContext::new(3, PLAIN);
        ctx.key_locked = true;
        ctx.key_name = "C major".to_string();
        let next = set_key(&ctx, "A major", &mut rng(11)).unwrap();
        assert_eq!(next.key_name, "A major");
        for entry in &next.chords {
            assert!(in_key(&entry.chord, "A major"));
        }
        assert!(matches!(
            set_key(&ctx, "Z nonsense", &mut rng(12)),
            Err(Error::KeyMismatch { .. })
        ));
    }

    #[test]
    fn homeless_locked_first_chord_fails_fast() {
        let mut ctx = GenerationContext::new(2, PLAIN);
        ctx.chords[0].chord = ExplodedChord::new("C", "aug");
        ctx.chords[0].locked = true;
        assert!(matches!(
            shuffle_all(&ctx, &mut rng(13)),
            Err(Error::NoCompatibleKey { attempts: 1 })
        ));
    }

    #[test]
    fn retries_are_bounded_when_no_chord_has_a_home() {
        const ONLY_AUG: Flavour = Flavour {
            name: "only aug",
            weighting: None,
            whitelist: Some(&["aug"]),
            blacklist: None,
        };
        let ctx = GenerationContext::new(2, ONLY_AUG);
        assert!(matches!(
            shuffle_all(&ctx, &mut rng(14)),
            Err(Error::NoCompatibleKey {
                attempts: MAX_KEY_RETRIES
            })
        ));
    }

    #[test]
    fn unsatisfiable_flavour_surfaces_empty_candidates() {
        const IMPOSSIBLE: Flavour = Flavour {
            name: "impossible",
            weighting: None,
            whitelist: Some(&["mmaj13#11"]),
            blacklist: None,
        };
        let ctx = GenerationContext::new(2, IMPOSSIBLE);
        assert!(matches!(
            shuffle_all(&ctx, &mut rng(15)),
            Err(Error::EmptyCandidateSet { .. })
        ));
    }

    #[test]
    fn set_flavour_reshuffles_under_the_new_policy() {
        let ctx = shuffle_all(&GenerationContext::new(3, PLAIN), &mut rng(16)).unwrap();
        let next = set_flavour(&ctx, crate::flavour::MAX_POWER, &mut rng(17)).unwrap();
        assert_eq!(next.flavour, crate::flavour::MAX_POWER);
        for entry in &next.chords {
            assert_eq!(entry.chord.suffix, "5");
        }
    }

    #[test]
    fn empty_contexts_are_harmless() {
        let ctx = GenerationContext::new(0, PLAIN);
        let shuffled = shuffle_all(&ctx, &mut rng(19)).unwrap();
        assert!(shuffled.chords.is_empty());
        // no chord 0 to anchor to, so any well-formed key is accepted
        let keyed = set_key(&ctx, "Eb major", &mut rng(20)).unwrap();
        assert_eq!(keyed.key_name, "Eb major");
        assert!(matches!(
            set_key(&ctx, "Z nonsense", &mut rng(21)),
            Err(Error::KeyMismatch { .. })
        ));
        assert!(matches!(
            set_chord(&ctx, 0, ExplodedChord::new("C", "major"), &mut rng(22)),
            Err(Error::NoSuchEntry { index: 0, len: 0 })
        ));
    }

    #[test]
    fn set_chord_rejects_out_of_range_indices() {
        let ctx = GenerationContext::new(2, PLAIN);
        assert!(matches!(
            set_chord(&ctx, 5, ExplodedChord::new("D", "minor"), &mut rng(23)),
            Err(Error::NoSuchEntry { index: 5, len: 2 })
        ));
    }

    #[test]
    fn regeneration_avoids_locked_later_entries() {
        // a pool of six power chords makes collisions likely if regeneration
        // only looked at entries before its own slot
        for seed in 0..24 {
            let mut ctx = GenerationContext::new(3, crate::flavour::MAX_POWER);
            ctx.key_locked = true;
            ctx.key_name = "C major".to_string();
            ctx.chords[2].chord = ExplodedChord::new("A", "5");
            ctx.chords[2].locked = true;
            let next = shuffle_all(&ctx, &mut rng(seed)).unwrap();
            let mut seen = std::collections::HashSet::new();
            for entry in &next.chords {
                assert!(
                    seen.insert(entry.chord.clone()),
                    "seed {seed} duplicated {:?}",
                    entry.chord
                );
            }
        }
    }

    #[test]
    fn generated_sequences_avoid_duplicates_when_possible() {
        let ctx = GenerationContext::new(4, PLAIN);
        let next = shuffle_all(&ctx, &mut rng(18)).unwrap();
        let mut seen = std::collections::HashSet::new();
        for entry in &next.chords {
            assert!(seen.insert(entry.chord.clone()), "duplicate {:?}", entry.chord);
        }
    }
}

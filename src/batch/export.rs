use tracing::info;

use crate::{batch::RankingBatch, lexicon::Lexicon, pairs::PairGenerator};

/// Materialize one deterministic pass of the pair generator.
///
/// The generator is restarted, then `pairs_per_pass` triples are taken (fewer when
/// `cap` is smaller), so the export stops right before the first repeated triple.
///
/// # Arguments
/// * `generator` - restarted first, left positioned after the exported triples
/// * `lexicon` - indexes every sentence
/// * `cap` - optional max number of triples
pub fn export_full(generator: &mut PairGenerator<'_>, lexicon: &Lexicon, cap: Option<usize>) -> RankingBatch {
    generator.restart();
    let per_pass = generator.pairs_per_pass();
    let n = cap.map_or(per_pass, |c| c.min(per_pass));

    let mut out = RankingBatch::with_capacity(n);
    for triple in generator.by_ref().take(n) {
        out.push_triple(lexicon, &triple);
    }
    info!(
        "Exported {} pairs: queries ({}, {}), docs ({}, {}), labels ({},)",
        out.num_triples(),
        out.queries.len(),
        lexicon.text_maxlen,
        out.docs.len(),
        lexicon.text_maxlen,
        out.labels.len()
    );
    out
}

//! Clustering and pipeline behavior against an in-memory database, with
//! the deterministic bag-of-words embedder standing in for the model.

mod common;

use common::{clustering, entry, memory_pool, BagEmbedder};
use thematic::cluster::ClusteringEngine;
use thematic::ingest::process_entries;
use thematic::matcher::ThemeIndex;
use thematic::store;

const THRESHOLD: f32 = 0.5;

#[tokio::test]
async fn similar_novel_entries_share_one_theme_within_a_batch() {
    let pool = memory_pool().await;
    let entries = vec![
        entry(
            "https://example.org/a",
            "Rust post",
            "The Rust compiler improves error messages.",
        ),
        entry(
            "https://example.org/b",
            "Rust follow-up",
            "The Rust compiler improves its error messages.",
        ),
    ];

    let summary = process_entries(&clustering(THRESHOLD), &pool, BagEmbedder::shared(), entries)
        .await
        .unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.skipped, 0);

    // The first entry founded the theme; the second attached to it in the
    // same run instead of creating a duplicate.
    let themes = store::list_themes(&pool).await.unwrap();
    assert_eq!(themes.len(), 1);
    assert_eq!(themes[0].document_count, 2);

    let a = store::get_document_by_url(&pool, "https://example.org/a")
        .await
        .unwrap()
        .unwrap();
    let b = store::get_document_by_url(&pool, "https://example.org/b")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.theme_id, b.theme_id);
}

#[tokio::test]
async fn dissimilar_entries_create_separate_themes() {
    let pool = memory_pool().await;
    let entries = vec![
        entry(
            "https://example.org/a",
            "Quantum",
            "Quantum computing advances rapidly.",
        ),
        entry(
            "https://example.org/b",
            "Garden",
            "Gardening tips for the summer.",
        ),
    ];

    let summary = process_entries(&clustering(THRESHOLD), &pool, BagEmbedder::shared(), entries)
        .await
        .unwrap();

    assert_eq!(summary.created, 2);
    let themes = store::list_themes(&pool).await.unwrap();
    assert_eq!(themes.len(), 2);
}

#[tokio::test]
async fn matching_decision_is_deterministic() {
    let pool = memory_pool().await;
    let embedder = BagEmbedder::shared();
    let engine = ClusteringEngine::new(embedder, &clustering(THRESHOLD));

    // Persisted state from earlier runs.
    let climate = store::create_theme(&pool, "Climate change affects farming")
        .await
        .unwrap();
    let quantum = store::create_theme(&pool, "Quantum computing advances")
        .await
        .unwrap();

    let reps = store::list_theme_representatives(&pool).await.unwrap();
    let mut index = ThemeIndex::from_representatives(reps);

    // Near the climate theme: attaches, no mutation.
    let id = engine
        .assign(
            &pool,
            &mut index,
            "Climate change effects on farming and crops.",
        )
        .await
        .unwrap();
    assert_eq!(id, climate.id);
    assert_eq!(index.len(), 2);

    // Far from everything: founds a new theme.
    let id = engine
        .assign(&pool, &mut index, "The history of ancient Rome.")
        .await
        .unwrap();
    assert_ne!(id, climate.id);
    assert_ne!(id, quantum.id);
    assert_eq!(index.len(), 3);
    assert_eq!(store::list_themes(&pool).await.unwrap().len(), 3);
}

#[tokio::test]
async fn reingesting_unchanged_entries_skips_everything() {
    let pool = memory_pool().await;
    let make_entries = || {
        vec![
            entry(
                "https://example.org/a",
                "Rust post",
                "The Rust compiler improves error messages.",
            ),
            entry(
                "https://example.org/b",
                "Garden",
                "Gardening tips for the summer.",
            ),
        ]
    };

    let first = process_entries(
        &clustering(THRESHOLD),
        &pool,
        BagEmbedder::shared(),
        make_entries(),
    )
    .await
    .unwrap();
    assert_eq!(first.created, 2);

    let second = process_entries(
        &clustering(THRESHOLD),
        &pool,
        BagEmbedder::shared(),
        make_entries(),
    )
    .await
    .unwrap();

    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, 2);

    // No duplicate documents or themes appeared.
    let themes = store::list_themes(&pool).await.unwrap();
    let total_documents: i64 = themes.iter().map(|t| t.document_count).sum();
    assert_eq!(total_documents, 2);
}

#[tokio::test]
async fn changed_content_moves_document_and_keeps_orphan_theme() {
    let pool = memory_pool().await;
    let cfg = clustering(THRESHOLD);

    process_entries(
        &cfg,
        &pool,
        BagEmbedder::shared(),
        vec![
            entry(
                "https://example.org/a",
                "Rust post",
                "The Rust compiler improves error messages.",
            ),
            entry(
                "https://example.org/b",
                "Garden",
                "Gardening tips for the summer.",
            ),
        ],
    )
    .await
    .unwrap();

    let before = store::get_document_by_url(&pool, "https://example.org/a")
        .await
        .unwrap()
        .unwrap();
    let old_theme_id = before.theme_id.unwrap();

    // Same URL, rewritten body: the document follows its new content.
    let summary = process_entries(
        &cfg,
        &pool,
        BagEmbedder::shared(),
        vec![entry(
            "https://example.org/a",
            "Garden post now",
            "Gardening tips for the summer garden.",
        )],
    )
    .await
    .unwrap();

    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 0);

    let after = store::get_document_by_url(&pool, "https://example.org/a")
        .await
        .unwrap()
        .unwrap();
    let b = store::get_document_by_url(&pool, "https://example.org/b")
        .await
        .unwrap()
        .unwrap();

    assert_ne!(after.theme_id, Some(old_theme_id));
    assert_eq!(after.theme_id, b.theme_id);
    // First-ingestion time survives the update.
    assert_eq!(after.ingested_at, before.ingested_at);

    // The abandoned theme is kept, thesis untouched, with zero documents.
    let themes = store::list_themes(&pool).await.unwrap();
    let orphan = themes.iter().find(|t| t.id == old_theme_id).unwrap();
    assert_eq!(orphan.document_count, 0);
    assert_eq!(orphan.thesis, "The Rust compiler improves error messages");
}

#[tokio::test]
async fn bad_entries_are_isolated_not_fatal() {
    let pool = memory_pool().await;

    let mut entries: Vec<_> = (0..9)
        .map(|i| {
            entry(
                &format!("https://example.org/{}", i),
                &format!("Post {}", i),
                &format!("Unique subject number {} with its own words.", i),
            )
        })
        .collect();
    // Malformed: no link or id at all.
    entries.insert(4, entry("", "Anonymous", "Body without identity."));

    let summary = process_entries(
        &clustering(THRESHOLD),
        &pool,
        BagEmbedder::shared(),
        entries,
    )
    .await
    .unwrap();

    assert_eq!(summary.created, 9);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn entries_without_extractable_content_are_skipped() {
    let pool = memory_pool().await;
    let entries = vec![
        // Punctuation-only body: no sentence survives segmentation.
        entry("https://example.org/punct", "Dots", "... !!! ???"),
        // Nothing at all to resolve a body from.
        entry("https://example.org/empty", "", ""),
        entry(
            "https://example.org/ok",
            "Fine",
            "A perfectly ordinary sentence.",
        ),
    ];

    let summary = process_entries(
        &clustering(THRESHOLD),
        &pool,
        BagEmbedder::shared(),
        entries,
    )
    .await
    .unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 2);
    assert!(store::get_document_by_url(&pool, "https://example.org/punct")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn timeline_reflects_assignments_in_published_order() {
    let pool = memory_pool().await;

    let mut early = entry(
        "https://example.org/early",
        "Early",
        "The Rust compiler improves error messages.",
    );
    early.published_at = 1_600_000_000;
    let mut late = entry(
        "https://example.org/late",
        "Late",
        "The Rust compiler improves its error messages.",
    );
    late.published_at = 1_800_000_000;

    // Ingest out of chronological order.
    process_entries(
        &clustering(THRESHOLD),
        &pool,
        BagEmbedder::shared(),
        vec![late, early],
    )
    .await
    .unwrap();

    let themes = store::list_themes(&pool).await.unwrap();
    assert_eq!(themes.len(), 1);

    let timeline = store::theme_timeline(&pool, themes[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(timeline.documents.len(), 2);
    assert_eq!(timeline.documents[0].url, "https://example.org/early");
    assert_eq!(timeline.documents[1].url, "https://example.org/late");
}

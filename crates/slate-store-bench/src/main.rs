//! Hand-timed benchmark binary for the document-oriented hot paths: raw KV
//! get/set, collection insert/find, and full-text/vector index builds.
//! Manual `Instant` timing rather than a `criterion` harness, matching how
//! this workspace has always benchmarked its storage layer.

use std::time::Instant;

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::{Value, json};
use slate_engine::{Collection, Schema};
use slate_fulltext::FulltextIndex;
use slate_store::{MemoryStore, RedbBackedStore, RocksStore, Store, Transaction};
use slate_vector::{DistanceMetric, VectorIndex};

const KV_RECORDS: usize = 200_000;
const KV_BATCH: usize = 1_000;
const VALUE_SIZE: usize = 1_000;

const DOC_COUNT: usize = 20_000;

fn kv_key(id: usize) -> Vec<u8> {
    format!("bench:{id:08}").into_bytes()
}

fn kv_value(rng: &mut impl Rng) -> Vec<u8> {
    (0..VALUE_SIZE).map(|_| rng.sample(Alphanumeric) as u8).collect()
}

// ---------------------------------------------------------------------------
// Raw KV get/set
// ---------------------------------------------------------------------------

fn bench_kv<S: Store>(store: &S, name: &str) {
    store.create_bucket("bench").unwrap();
    let mut rng = rand::thread_rng();

    let write_start = Instant::now();
    for batch in 0..(KV_RECORDS / KV_BATCH) {
        let txn = store.begin(false).unwrap();
        for i in 0..KV_BATCH {
            let id = batch * KV_BATCH + i;
            txn.put("bench", &kv_key(id), &kv_value(&mut rng)).unwrap();
        }
        txn.commit().unwrap();
    }
    let write_time = write_start.elapsed();

    let read_start = Instant::now();
    let txn = store.begin(true).unwrap();
    let mut found = 0usize;
    for id in 0..KV_RECORDS {
        if txn.get("bench", &kv_key(id)).unwrap().is_some() {
            found += 1;
        }
    }
    let read_time = read_start.elapsed();

    println!("--- {name}: KV get/set ---");
    println!(
        "  write: {:>8.2}ms  ({:.0} rec/s)",
        write_time.as_secs_f64() * 1000.0,
        KV_RECORDS as f64 / write_time.as_secs_f64(),
    );
    println!(
        "  read:  {:>8.2}ms  ({:.0} rec/s, {found} found)",
        read_time.as_secs_f64() * 1000.0,
        KV_RECORDS as f64 / read_time.as_secs_f64(),
    );
    println!();
}

// ---------------------------------------------------------------------------
// Document generation shared by the collection and index benches
// ---------------------------------------------------------------------------

fn sample_doc(rng: &mut impl Rng, id: usize) -> serde_json::Map<String, Value> {
    let words = ["orbit", "lattice", "signal", "harbor", "quartz", "ember", "relay", "vapor"];
    let title: String =
        (0..6).map(|_| words[rng.gen_range(0..words.len())]).collect::<Vec<_>>().join(" ");
    let embedding: Vec<f64> = (0..16).map(|_| rng.gen_range(-1.0..1.0)).collect();
    json!({
        "_id": format!("doc-{id:06}"),
        "title": title,
        "embedding": embedding,
    })
    .as_object()
    .unwrap()
    .clone()
}

// ---------------------------------------------------------------------------
// Collection insert/find
// ---------------------------------------------------------------------------

fn bench_collection(store: std::sync::Arc<MemoryStore>) -> std::sync::Arc<Collection<std::sync::Arc<MemoryStore>>> {
    let collection =
        std::sync::Arc::new(Collection::open("bench_docs", store, Schema::new("_id")).unwrap());
    let mut rng = rand::thread_rng();
    let docs: Vec<_> = (0..DOC_COUNT).map(|id| sample_doc(&mut rng, id)).collect();

    let insert_start = Instant::now();
    for doc in docs.into_iter() {
        collection.insert_one(doc).unwrap();
    }
    let insert_time = insert_start.elapsed();

    let find_start = Instant::now();
    let mut found = 0usize;
    for id in 0..DOC_COUNT {
        if collection.find_by_id(&format!("doc-{id:06}")).unwrap().is_some() {
            found += 1;
        }
    }
    let find_time = find_start.elapsed();

    println!("--- MemoryStore: collection insert/find ---");
    println!(
        "  insert: {:>8.2}ms  ({:.0} doc/s)",
        insert_time.as_secs_f64() * 1000.0,
        DOC_COUNT as f64 / insert_time.as_secs_f64(),
    );
    println!(
        "  find:   {:>8.2}ms  ({:.0} doc/s, {found} found)",
        find_time.as_secs_f64() * 1000.0,
        DOC_COUNT as f64 / find_time.as_secs_f64(),
    );
    println!();

    collection
}

// ---------------------------------------------------------------------------
// Full-text and vector index build
// ---------------------------------------------------------------------------

fn bench_index_build(
    collection: &Collection<std::sync::Arc<MemoryStore>>,
    store: std::sync::Arc<MemoryStore>,
) {
    let fulltext = FulltextIndex::open(store.clone(), "bench_fts", Default::default(), |doc| {
        doc.get("title").and_then(Value::as_str).unwrap_or_default().to_string()
    })
    .unwrap();
    let fulltext_start = Instant::now();
    fulltext.reindex(collection, 1_000).unwrap();
    let fulltext_time = fulltext_start.elapsed();

    let vector = VectorIndex::open(store, "bench_vec", 16, DistanceMetric::Cosine, |doc| {
        doc.get("embedding")
            .and_then(Value::as_array)
            .map(|v| v.iter().filter_map(Value::as_f64).collect())
    })
    .unwrap();
    let vector_start = Instant::now();
    vector.reindex(collection, 1_000).unwrap();
    let vector_time = vector_start.elapsed();

    println!("--- index build over {DOC_COUNT} documents ---");
    println!(
        "  full-text: {:>8.2}ms  ({:.0} doc/s, {} terms indexed)",
        fulltext_time.as_secs_f64() * 1000.0,
        DOC_COUNT as f64 / fulltext_time.as_secs_f64(),
        fulltext.count().unwrap(),
    );
    println!(
        "  vector:    {:>8.2}ms  ({:.0} doc/s, {} vectors indexed)",
        vector_time.as_secs_f64() * 1000.0,
        DOC_COUNT as f64 / vector_time.as_secs_f64(),
        vector.count().unwrap(),
    );
    println!();
}

fn main() {
    tracing_subscriber::fmt::init();

    println!("============================================================");
    println!("  MemoryStore");
    println!("============================================================");
    println!();
    bench_kv(&MemoryStore::new(), "MemoryStore");

    println!("============================================================");
    println!("  RocksStore");
    println!("============================================================");
    println!();
    let rocks_dir = tempfile::tempdir().unwrap();
    let rocks_store = RocksStore::open(&rocks_dir.path().join("bench.rocks")).unwrap();
    bench_kv(&rocks_store, "RocksStore");

    println!("============================================================");
    println!("  RedbBackedStore");
    println!("============================================================");
    println!();
    let redb_dir = tempfile::tempdir().unwrap();
    let redb_store = RedbBackedStore::open(&redb_dir.path().join("bench.redb")).unwrap();
    bench_kv(&redb_store, "RedbBackedStore");

    println!("============================================================");
    println!("  Document-oriented hot paths (MemoryStore)");
    println!("============================================================");
    println!();
    let doc_store = std::sync::Arc::new(MemoryStore::new());
    let collection = bench_collection(doc_store.clone());
    bench_index_build(&collection, doc_store);
}

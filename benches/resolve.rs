//! Benchmarks for group resolution and catalog merging.
//!
//! Resolution walks members in order until one holds the path, so the
//! interesting cases are a hit in the first member and a hit in the last.
//! Merging is measured for an aggregate over several populated members.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use group_index::catalog::{Catalog, PathFilter};
use group_index::catalog_manager::CatalogManager;
use group_index::content::{ContentStore, FileContentStore};
use group_index::registry::{MemoryRegistry, StoreRegistry};
use group_index::resolver::ContentResolver;
use group_index::store::{RepositoryDescriptor, RepositoryKey};

const MEMBERS: usize = 20;

/// A group `public` over `MEMBERS` hosted repositories, each holding a
/// handful of artifacts; `org/last/last.jar` exists only in the last one.
fn setup() -> (TempDir, Arc<MemoryRegistry>, Arc<FileContentStore>) {
    let temp = TempDir::new().unwrap();
    let content = Arc::new(FileContentStore::new(temp.path().to_path_buf()));
    let registry = Arc::new(MemoryRegistry::new());

    let mut members = Vec::new();
    for i in 0..MEMBERS {
        let name = format!("hosted{}", i);
        registry
            .insert(RepositoryDescriptor::Hosted { name: name.clone() })
            .unwrap();
        let key = RepositoryKey::hosted(&name);
        for j in 0..25 {
            let file = content
                .storage_root(&key)
                .join(format!("org/lib{}/1.{}/lib{}-1.{}.jar", j, i, j, i));
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, b"jar").unwrap();
        }
        members.push(key);
    }
    let last = content
        .storage_root(members.last().unwrap())
        .join("org/last/last.jar");
    fs::create_dir_all(last.parent().unwrap()).unwrap();
    fs::write(last, b"jar").unwrap();

    registry
        .insert(RepositoryDescriptor::Group {
            name: "inner".to_string(),
            members: members[..MEMBERS / 2].to_vec(),
        })
        .unwrap();
    let mut outer = vec![RepositoryKey::group("inner")];
    outer.extend_from_slice(&members[MEMBERS / 2..]);
    registry
        .insert(RepositoryDescriptor::Group {
            name: "public".to_string(),
            members: outer,
        })
        .unwrap();

    (temp, registry, content)
}

fn bench_resolve(c: &mut Criterion) {
    let (_temp, registry, content) = setup();
    let resolver = ContentResolver::new(registry.clone(), content);
    let group = RepositoryKey::group("public");

    c.bench_function("resolve_first_member", |b| {
        b.iter(|| resolver.resolve(black_box(&group), black_box("/org/lib0/1.0/lib0-1.0.jar")))
    });

    c.bench_function("resolve_last_member", |b| {
        b.iter(|| resolver.resolve(black_box(&group), black_box("/org/last/last.jar")))
    });

    c.bench_function("resolve_miss", |b| {
        b.iter(|| resolver.resolve(black_box(&group), black_box("/org/none/none.jar")))
    });

    c.bench_function("list_children_union", |b| {
        b.iter(|| resolver.list_children(black_box(&group), black_box("/org/lib3")))
    });

    c.bench_function("ordered_members_nested", |b| {
        b.iter(|| registry.ordered_members(black_box("public")).unwrap())
    });
}

fn bench_merge(c: &mut Criterion) {
    let (_temp, registry, content) = setup();
    let catalogs = CatalogManager::new(content, PathFilter::default());
    let members = registry.ordered_members("public").unwrap();
    for member in &members {
        let mut catalog = catalogs.open(member).unwrap();
        catalog.scan(catalogs.filter()).unwrap();
        catalog.commit().unwrap();
        catalogs.close(catalog);
    }

    let group = RepositoryKey::group("public");
    c.bench_function("merge_group_aggregate", |b| {
        b.iter(|| {
            let mut aggregate: Catalog = catalogs.open(&group).unwrap();
            for member in &members {
                aggregate
                    .merge_from(member, &catalogs.index_dir(member))
                    .unwrap();
            }
            aggregate.commit().unwrap();
            catalogs.close(aggregate);
        })
    });
}

criterion_group!(benches, bench_resolve, bench_merge);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keystone_di::*;
use std::sync::Arc;

struct Config {
    port: u16,
}

impl Injectable for Config {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |_| Ok(Config { port: 8080 }))]
    }
}

struct Repository {
    config: Arc<Config>,
}

impl Injectable for Repository {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Repository { config: args.next()? }))
            .param(Parameter::service::<Config>("config"))]
    }
}

struct Handler {
    repository: Arc<Repository>,
}

impl Injectable for Handler {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |args| Ok(Handler { repository: args.next()? }))
            .param(Parameter::service::<Repository>("repository"))]
    }
}

trait Greeter: Send + Sync {
    fn greet(&self) -> usize;
}

struct English;

impl Greeter for English {
    fn greet(&self) -> usize {
        5
    }
}

impl Injectable for English {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |_| Ok(English))]
    }
}

implements!(English => dyn Greeter);

fn app_container() -> Container {
    let container = Container::new();
    container.register_concrete::<Config>(Lifestyle::Singleton).unwrap();
    container.register_concrete::<Repository>(Lifestyle::scoped()).unwrap();
    container.register_concrete::<Handler>(Lifestyle::Transient).unwrap();
    container
}

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let container = app_container();

    // Prime the singleton
    let _ = container.get_instance::<Config>().unwrap();

    c.bench_function("singleton_hit", |b| {
        b.iter(|| {
            let v = container.get_instance::<Config>().unwrap();
            black_box(v.port);
        })
    });
}

fn bench_singleton_cold(c: &mut Criterion) {
    struct ExpensiveToCreate {
        data: Vec<u64>,
    }

    c.bench_function("singleton_cold_expensive", |b| {
        b.iter_batched(
            || {
                let container = Container::new();
                container
                    .register_factory::<ExpensiveToCreate, _>(Lifestyle::Singleton, |_| {
                        Ok(Arc::new(ExpensiveToCreate { data: (0..1000).collect() }))
                    })
                    .unwrap();
                container
            },
            |container| {
                let v = container.get_instance::<ExpensiveToCreate>().unwrap();
                black_box(v.data.len());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_scoped_vs_transient(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped_vs_transient");
    let container = app_container();
    let scope = container.begin_scope();

    group.bench_function("scoped_hit", |b| {
        b.iter(|| black_box(scope.get_instance::<Repository>().unwrap()))
    });

    group.bench_function("transient_graph", |b| {
        b.iter(|| black_box(scope.get_instance::<Handler>().unwrap().repository.config.port))
    });

    group.finish();
}

fn bench_concrete_vs_trait(c: &mut Criterion) {
    let mut group = c.benchmark_group("concrete_vs_trait");
    let container = Container::new();
    container.register_concrete::<English>(Lifestyle::Singleton).unwrap();
    container.register::<dyn Greeter, English>(Lifestyle::Singleton).unwrap();

    group.bench_function("concrete", |b| b.iter(|| black_box(container.get_instance::<English>().unwrap())));
    group.bench_function("trait", |b| {
        b.iter(|| black_box(container.get_instance::<dyn Greeter>().unwrap().greet()))
    });

    group.finish();
}

fn bench_collection_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection_scaling");

    for &count in &[1usize, 8, 64] {
        let container = Container::new();
        for _ in 0..count {
            container.append_to_collection::<dyn Greeter, English>(Lifestyle::Singleton).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("get_all_instances", count), &count, |b, _| {
            b.iter(|| black_box(container.get_all_instances::<dyn Greeter>().unwrap().len()))
        });
    }

    group.finish();
}

fn bench_scope_lifecycle(c: &mut Criterion) {
    let container = app_container();

    c.bench_function("scope_begin_resolve_end", |b| {
        b.iter(|| {
            let scope = container.begin_scope();
            black_box(scope.get_instance::<Handler>().unwrap());
            scope.end().unwrap();
        })
    });
}

// ===== Macro Benchmarks =====

fn bench_verify(c: &mut Criterion) {
    c.bench_function("verify_small_graph", |b| {
        b.iter_batched(
            app_container,
            |container| black_box(container.verify().unwrap().warnings().len()),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let container = app_container();
    let _ = container.get_instance::<Config>().unwrap();

    for &thread_count in &[1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("singleton_threads", thread_count),
            &thread_count,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let start = std::time::Instant::now();
                    crossbeam_utils::thread::scope(|s| {
                        for _ in 0..threads {
                            let container = &container;
                            s.spawn(move |_| {
                                for _ in 0..iters / threads as u64 {
                                    let v = container.get_instance::<Config>().unwrap();
                                    black_box(v);
                                }
                            });
                        }
                    })
                    .unwrap();
                    start.elapsed()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    micro_benches,
    bench_singleton_hit,
    bench_singleton_cold,
    bench_scoped_vs_transient,
    bench_concrete_vs_trait,
    bench_collection_scaling,
    bench_scope_lifecycle
);

criterion_group!(macro_benches, bench_verify, bench_contention);

criterion_main!(micro_benches, macro_benches);

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use meetspot::{Config, DB, EntityRecord, Field, Filter, GeoPoint, NearestQuery};

fn populated_db(config: Config, count: usize) -> DB {
    let db = DB::memory_with_config(config).unwrap();
    for i in 0..count {
        let lat = 50.9 + ((i * 7919) % 1000) as f64 * 0.0003;
        let lng = -114.3 + ((i * 104729) % 1000) as f64 * 0.0005;
        db.insert(
            EntityRecord::new(format!("m{}", i), "meeting", GeoPoint::new(lat, lng))
                .with_attribute("weekday", (i % 7) as i64)
                .with_sort_key((i * 15 % 1440) as f64),
        )
        .unwrap();
    }
    db
}

fn benchmark_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    let db = DB::memory().unwrap();
    group.bench_function("single_insert", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            let lat = 51.0 + (counter % 1000) as f64 * 0.0001;
            let lng = -114.0 - (counter / 1000 % 1000) as f64 * 0.0001;
            let record = EntityRecord::new(format!("i{}", counter), "i", GeoPoint::new(lat, lng));
            counter += 1;
            db.insert(black_box(record)).unwrap()
        })
    });

    group.finish();
}

fn benchmark_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest");
    let center = GeoPoint::new(51.05, -114.05);

    for &count in &[1_000usize, 10_000, 50_000] {
        let db = populated_db(Config::default(), count);
        group.bench_with_input(BenchmarkId::new("radius_10km_limit_10", count), &count, |b, _| {
            b.iter(|| {
                db.nearest(black_box(NearestQuery::new(center, 10_000.0).with_limit(10)))
                    .unwrap()
            })
        });
    }

    let db = populated_db(Config::default(), 10_000);
    let filter = Filter::new()
        .in_set(Field::attribute("weekday"), [2i64, 3])
        .range(Field::SortKey, 0.0, 1440.0);
    group.bench_function("filtered_limit_150", |b| {
        b.iter(|| {
            db.nearest(black_box(
                NearestQuery::new(center, 50_000.0)
                    .with_limit(150)
                    .with_filter(filter.clone()),
            ))
            .unwrap()
        })
    });

    group.finish();
}

fn benchmark_grid_precision(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_precision");
    let center = GeoPoint::new(51.05, -114.05);

    for precision in 3..=7 {
        let db = populated_db(Config::default().with_grid_precision(precision), 10_000);
        group.bench_with_input(BenchmarkId::from_parameter(precision), &precision, |b, _| {
            b.iter(|| {
                db.nearest(black_box(NearestQuery::new(center, 5_000.0).with_limit(25)))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_insert,
    benchmark_nearest,
    benchmark_grid_precision
);
criterion_main!(benches);

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use imcluster::dbscan::{Dbscan, estimate_eps};
use imcluster::kmeans::{KMeansConfig, kmeans};
use imcluster::metrics::silhouette_score;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// 生成有聚类模式的测试数据
fn generate_clustered_data(n: usize, dim: usize, num_clusters: usize) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(42);

    let centers = (0..num_clusters)
        .map(|_| (0..dim).map(|_| rng.random_range(-5.0f32..5.0)).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    // 在聚类中心附近生成数据
    let mut data = Array2::zeros((n, dim));
    for i in 0..n {
        let center = &centers[i % num_clusters];
        for j in 0..dim {
            data[[i, j]] = center[j] + rng.random_range(-0.5f32..0.5);
        }
    }
    data
}

fn bench_kmeans(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans_384d");

    for (n, k) in black_box(vec![(200, 4), (1000, 8)]) {
        let data = black_box(generate_clustered_data(n, 384, k));

        group.bench_function(format!("kmeans_{n}_{k}"), |b| {
            b.iter(|| kmeans(data.view(), &KMeansConfig::new(k).n_init(5).max_iter(100)))
        });

        let labels = kmeans(data.view(), &KMeansConfig::new(k)).unwrap().assignments;
        group.bench_function(format!("silhouette_{n}_{k}"), |b| {
            b.iter(|| silhouette_score(data.view(), &labels))
        });

        group.bench_function(format!("dbscan_{n}"), |b| {
            b.iter(|| {
                let eps = estimate_eps(data.view(), 5, 75.0).unwrap();
                Dbscan::new(eps, 2).fit_predict(data.view())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kmeans);
criterion_main!(benches);

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fiber_core::{
    create_root_container, update_root_container, Element, FiberRoot, MemoryHost, Node,
    TaskScheduler,
};
use fiber_runtime_std::StdScheduler;

const ROW_SAMPLES: &[usize] = &[16, 64, 256, 1024];

struct ListFixture {
    root: FiberRoot<MemoryHost>,
    scheduler: Rc<StdScheduler>,
}

impl ListFixture {
    fn new() -> Self {
        let scheduler = Rc::new(StdScheduler::new());
        let tasks: Rc<dyn TaskScheduler> = scheduler.clone();
        let host = MemoryHost::new();
        let container = host.root();
        Self {
            root: create_root_container(host, container, tasks),
            scheduler,
        }
    }

    fn render(&self, order: &[usize]) {
        update_root_container(keyed_rows(order), &self.root).expect("render");
        self.scheduler.run_until_idle();
        self.root.with_host_mut(|host| host.take_ops());
    }
}

fn keyed_rows(order: &[usize]) -> Node {
    Element::host("ul")
        .children(order.iter().map(|row| {
            Element::host("li")
                .key(row.to_string())
                .attr("data-row", *row as i64)
                .text(format!("Item {row}"))
                .into()
        }))
        .into()
}

fn rotated(rows: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows).collect();
    order.rotate_right(1);
    order
}

fn reversed(rows: usize) -> Vec<usize> {
    (0..rows).rev().collect()
}

fn bench_keyed_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_list");
    for &rows in ROW_SAMPLES {
        let identity: Vec<usize> = (0..rows).collect();
        let rotation = rotated(rows);
        let reversal = reversed(rows);

        group.bench_with_input(BenchmarkId::new("mount", rows), &rows, |b, _| {
            b.iter(|| {
                let fixture = ListFixture::new();
                fixture.render(black_box(&identity));
            });
        });

        let fixture = ListFixture::new();
        fixture.render(&identity);
        group.bench_with_input(BenchmarkId::new("unchanged", rows), &rows, |b, _| {
            b.iter(|| fixture.render(black_box(&identity)));
        });

        group.bench_with_input(BenchmarkId::new("rotate", rows), &rows, |b, _| {
            b.iter(|| {
                fixture.render(black_box(&rotation));
                fixture.render(black_box(&identity));
            });
        });

        group.bench_with_input(BenchmarkId::new("reverse", rows), &rows, |b, _| {
            b.iter(|| {
                fixture.render(black_box(&reversal));
                fixture.render(black_box(&identity));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_keyed_list);
criterion_main!(benches);

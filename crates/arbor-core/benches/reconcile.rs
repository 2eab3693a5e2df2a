use arbor_core::{attrs, h, Child, MemoryRenderer, NodeId, VNode, Vdom};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

const SECTION_COUNT: usize = 4;
const ROWS_PER_SECTION: usize = 32;
const REORDER_ROW_SAMPLES: &[usize] = &[16, 64, 256, 1024];

fn table(sections: usize, rows_per_section: usize) -> VNode {
    let sections: Vec<Child> = (0..sections)
        .map(|section| {
            let rows: Vec<Child> = (0..rows_per_section)
                .map(|row| {
                    Child::Node(h(
                        "tr",
                        attrs! { "class" => "row" },
                        [
                            Child::Node(h("td", None, [format!("Item {section}-{row} title")])),
                            Child::Node(h("td", None, [format!("Detail {section}-{row}")])),
                        ],
                    ))
                })
                .collect();
            Child::Node(h(
                "tbody",
                None,
                [Child::Node(h("th", None, [format!("Section {section}")])), Child::List(rows)],
            ))
        })
        .collect();
    h("table", None, sections)
}

fn keyed_rows(order: impl Iterator<Item = usize>) -> VNode {
    let rows: Vec<Child> = order
        .map(|row| Child::Node(h("li", attrs! { "key" => row }, [row])))
        .collect();
    h("ul", None, rows)
}

struct ReconcileFixture {
    vdom: Vdom<MemoryRenderer>,
    container: NodeId,
    root: Option<NodeId>,
}

impl ReconcileFixture {
    fn new() -> Self {
        let mut renderer = MemoryRenderer::new();
        let container = renderer.create_container("body");
        Self {
            vdom: Vdom::new(renderer),
            container,
            root: None,
        }
    }

    fn render(&mut self, vnode: &VNode) {
        let root = self
            .vdom
            .render(vnode, self.container, self.root)
            .expect("render");
        self.root = Some(root);
        self.vdom.renderer_mut().clear_ops();
    }
}

fn bench_mount(c: &mut Criterion) {
    let tree = table(SECTION_COUNT, ROWS_PER_SECTION);
    c.bench_function("reconcile_mount", |b| {
        b.iter_batched(
            ReconcileFixture::new,
            |mut fixture| {
                fixture.render(&tree);
                black_box(fixture.root);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_identical_rerender(c: &mut Criterion) {
    let tree = table(SECTION_COUNT, ROWS_PER_SECTION);
    let mut fixture = ReconcileFixture::new();
    // Mount first so only the steady-state diff is measured.
    fixture.render(&tree);

    c.bench_function("reconcile_identical", |b| {
        b.iter(|| fixture.render(black_box(&tree)));
    });
}

fn bench_keyed_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_keyed_reorder");
    for &rows in REORDER_ROW_SAMPLES {
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, &rows| {
            let forward = keyed_rows(0..rows);
            let reversed = keyed_rows((0..rows).rev());
            let mut fixture = ReconcileFixture::new();
            fixture.render(&forward);

            b.iter(|| {
                fixture.render(&reversed);
                fixture.render(&forward);
            });
        });
    }
    group.finish();
}

criterion_group!(
    reconcile,
    bench_mount,
    bench_identical_rerender,
    bench_keyed_reorder
);
criterion_main!(reconcile);

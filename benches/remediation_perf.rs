//! Performance benchmarks for remediation hot paths.
//!
//! Run with: `cargo bench --bench remediation_perf`

use std::fmt::Write as _;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use workflow_injection_fixer::validate::WorkflowParser;
use workflow_injection_fixer::{
    Finding, RemediationOptions, YamlWorkflowParser, classify, generate_patch, patch_document,
    remediate_all,
};

// =============================================================================
// Benchmark Fixtures
// =============================================================================

/// A workflow with `jobs` jobs of `steps` single-line steps each. Every step
/// interpolates the issue title.
fn workflow(jobs: usize, steps: usize) -> String {
    let mut content = String::from("name: bench\non:\n  issues:\n\njobs:\n");
    for job in 0..jobs {
        let _ = writeln!(content, "  job{job}:\n    runs-on: ubuntu-latest\n    steps:");
        for step in 0..steps {
            let _ = writeln!(
                content,
                "      - run: echo \"${{{{ github.event.issue.title }}}}\" {step}"
            );
        }
    }
    content
}

/// Line numbers of every `run:` step of [`workflow`].
fn run_lines(content: &str) -> Vec<usize> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.trim_start().starts_with("- run:"))
        .map(|(index, _)| index + 1)
        .collect()
}

// =============================================================================
// Classification
// =============================================================================

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    let cases = [
        ("first_entry", "github.event.commits[0].author.email"),
        ("last_entry", "github.head_ref"),
        ("array_index", "github.event.commits[12].message"),
        ("unknown", "github.sha"),
    ];
    for (name, expression) in cases {
        group.bench_with_input(
            BenchmarkId::new("classify", name),
            expression,
            |b: &mut criterion::Bencher<'_>, expression: &str| {
                b.iter(|| classify(std::hint::black_box(expression)));
            },
        );
    }

    group.finish();
}

// =============================================================================
// Single finding
// =============================================================================

fn bench_single(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_finding");
    let options = RemediationOptions::default();
    let parser = YamlWorkflowParser::new();

    for (name, jobs, steps) in [("small", 1, 3), ("medium", 5, 10), ("large", 20, 25)] {
        let content = workflow(jobs, steps);
        let offset = run_lines(&content).last().copied().unwrap_or(1);
        let finding = Finding::new("ci.yml", offset, "github.event.issue.title");
        let original = parser.parse(&content);

        group.bench_with_input(
            BenchmarkId::new("patch_document", name),
            &content,
            |b: &mut criterion::Bencher<'_>, content: &String| {
                b.iter(|| patch_document(&finding, std::hint::black_box(content), &options));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("generate_patch", name),
            &content,
            |b: &mut criterion::Bencher<'_>, content: &String| {
                b.iter(|| {
                    generate_patch(
                        &finding,
                        std::hint::black_box(content),
                        &original,
                        &parser,
                        &options,
                    )
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Batch
// =============================================================================

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    group.sample_size(20);

    let parser = YamlWorkflowParser::new();
    let content = workflow(10, 10);
    let original = parser.parse(&content);
    let findings: Vec<Finding> = run_lines(&content)
        .into_iter()
        .map(|offset| Finding::new("ci.yml", offset, "github.event.issue.title"))
        .collect();

    for parallel in [false, true] {
        let options = RemediationOptions {
            parallel,
            ..RemediationOptions::default()
        };
        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_function(BenchmarkId::new("remediate_all", name), |b| {
            b.iter(|| remediate_all(&findings, &content, &original, &parser, &options));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_single, bench_batch);
criterion_main!(benches);

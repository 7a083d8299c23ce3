//! Workflow fixtures for remediation tests.
//!
//! Each fixture is a realistic workflow with at least one injectable
//! `run:` step. Line numbers referenced by tests are 1-based, as findings are.

/// Issue triage workflow without any workflow-level `env:` block.
///
/// Line 14 is the `run:` holding `github.event.issue.title` twice.
pub const ISSUE_TRIAGE: &str = "\
name: Issue triage
on:
  issues:
    types: [opened, edited]

permissions:
  issues: write

jobs:
  label:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - run: |
          echo \"Title: ${{ github.event.issue.title }}\"
          ./scripts/label.sh \"${{ github.event.issue.title }}\"
      - name: Notify
        run: echo \"${{ github.event.issue.title }}\" | ./scripts/notify.sh
";

/// Pull request workflow with an existing `env:` block.
///
/// `PR_TITLE` is already taken by a constant and `BRANCH` already holds
/// `github.head_ref`. Line 17 interpolates the PR title, line 19 the head ref.
pub const PULL_REQUEST: &str = "\
name: PR checks
on:
  pull_request_target:

env:
  PR_TITLE: fixed-title
  BRANCH: ${{ github.head_ref }}
  # keep in sync with release.yml
  NODE_VERSION: \"20\"

jobs:
  check:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - name: Title lint
        run: ./lint-title.sh \"${{ github.event.pull_request.title }}\"
      - name: Branch
        run: echo \"${{ github.head_ref }}\"
";

/// Push workflow with array-indexed commit expressions on lines 11 and 13,
/// indented with four spaces and without a trailing newline.
pub const PUSH_COMMITS: &str = "\
on:
    push:
        branches: [main]


jobs:
    changelog:
        runs-on: ubuntu-latest
        steps:
            -   name: First
                run: echo \"${{ github.event.commits[0].message }}\"
            -   name: Second
                run: echo \"${{ github.event.commits[1].message }}\"";

/// A document with neither `on:` nor `jobs:`.
pub const NOT_A_WORKFLOW: &str = "\
name: not a workflow
steps:
  - run: echo \"${{ github.event.issue.body }}\"
";

/// `on:` present but no `jobs:` label to anchor a new `env:` block.
pub const NO_JOBS: &str = "\
on: issues
steps:
  - run: echo \"${{ github.event.issue.body }}\"
";

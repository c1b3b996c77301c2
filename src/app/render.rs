use super::episode::{format_local_date, truncate};
use super::histogram::CommentDensityHistogram;
use super::thread::{Comment, CommentTree, SyncState, VoteDirection, VoteLedger};

const SPARK_LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const AUTHOR_WIDTH: usize = 16;
const CONTENT_WIDTH: usize = 72;

/// One character per bucket, scaled to the busiest bucket.
pub(crate) fn sparkline(histogram: &CommentDensityHistogram) -> String {
    let max = histogram.max_count();
    if max == 0 {
        return SPARK_LEVELS[0].to_string().repeat(histogram.len());
    }
    let top = (SPARK_LEVELS.len() - 1) as u64;
    histogram
        .y_axis()
        .iter()
        .map(|&count| {
            let level = (u64::from(count) * top).div_ceil(u64::from(max));
            SPARK_LEVELS[level as usize]
        })
        .collect()
}

pub(crate) fn comment_line(comment: &Comment, depth: usize, vote: Option<VoteDirection>) -> String {
    let marker = match vote {
        Some(VoteDirection::Up) => "^",
        Some(VoteDirection::Down) => "v",
        None => " ",
    };
    let sync = match comment.sync {
        SyncState::Confirmed => "",
        SyncState::Pending => " (sending)",
        SyncState::Failed => " (not saved)",
    };
    format!(
        "{indent}#{id:<6} {time:>8} {author:<width$} {date} {marker} +{up}/-{down} {approval:>4}  {content}{sync}",
        indent = "  ".repeat(depth),
        id = comment.id,
        time = comment.timepoint.format(),
        author = truncate(&comment.author.name, AUTHOR_WIDTH),
        width = AUTHOR_WIDTH,
        date = format_local_date(&comment.created_at),
        up = comment.up_votes,
        down = comment.down_votes,
        approval = if comment.is_deleted() {
            "-".to_string()
        } else {
            comment.format_approval()
        },
        content = truncate(&comment.content, CONTENT_WIDTH),
    )
}

/// A thread root followed by its replies, depth first, each indented by depth.
pub(crate) fn thread_lines(tree: &CommentTree, ledger: &VoteLedger, root: &Comment) -> Vec<String> {
    let mut lines = Vec::new();
    push_thread(tree, ledger, root, 0, &mut lines);
    lines
}

fn push_thread(
    tree: &CommentTree,
    ledger: &VoteLedger,
    comment: &Comment,
    depth: usize,
    lines: &mut Vec<String>,
) {
    lines.push(comment_line(comment, depth, ledger.vote_of(comment.id)));
    for reply in tree.replies_of(comment.id) {
        push_thread(tree, ledger, reply, depth + 1, lines);
    }
}

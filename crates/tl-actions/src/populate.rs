//! Reference expansion for thread trees.
//!
//! An [`Expand`] plan says, level by level, whether a thread's author and
//! children are replaced by their records. Levels are loaded top-down with
//! one store call each, authors for all levels with one more call, and the
//! tree is then assembled bottom-up. Anything the plan does not reach, or
//! that no longer exists, stays a bare id.

use std::collections::{HashMap, HashSet};

use tl_core::models::{Author, Ref, Thread, ThreadNode};
use tl_core::traits::{ThreadStore, UserStore};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expand {
    pub author: bool,
    /// Plan for each child. `None` leaves children as ids.
    pub children: Option<&'static Expand>,
}

/// Author only; children stay ids.
pub const AUTHOR_ONLY: Expand = Expand {
    author: true,
    children: None,
};

/// Thread listings: author, plus each child with its author.
pub const LISTING: Expand = Expand {
    author: true,
    children: Some(&AUTHOR_ONLY),
};

/// Single-thread view: three levels with authors.
pub const DETAIL: Expand = Expand {
    author: true,
    children: Some(&LISTING),
};

/// A user's own threads: the author is the user already, so only the
/// children and their authors are expanded.
pub const USER_THREADS: Expand = Expand {
    author: false,
    children: Some(&AUTHOR_ONLY),
};

impl Expand {
    /// Number of thread levels this plan touches, counting the root.
    pub fn depth(&self) -> usize {
        1 + self.children.map_or(0, Expand::depth)
    }
}

/// Expands `roots` according to `plan`, keeping their order.
pub async fn expand(
    threads: &dyn ThreadStore,
    users: &dyn UserStore,
    roots: Vec<Thread>,
    plan: &Expand,
) -> anyhow::Result<Vec<ThreadNode>> {
    let mut levels: Vec<(Vec<Thread>, &Expand)> = vec![(roots, plan)];
    while let Some((parents, next)) = levels
        .last()
        .and_then(|(parents, plan)| plan.children.map(|next| (parents, next)))
    {
        let ids: Vec<Uuid> = parents
            .iter()
            .flat_map(|t| t.children.iter().copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let loaded = if ids.is_empty() {
            Vec::new()
        } else {
            threads.find_threads(&ids).await?
        };
        levels.push((loaded, next));
    }

    let author_ids: Vec<Uuid> = levels
        .iter()
        .filter(|(_, plan)| plan.author)
        .flat_map(|(level, _)| level.iter().map(|t| t.author))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let authors: HashMap<Uuid, Author> = if author_ids.is_empty() {
        HashMap::new()
    } else {
        users
            .find_authors(&author_ids)
            .await?
            .into_iter()
            .map(|a| (a.record_id, a))
            .collect()
    };

    let mut below: HashMap<Uuid, ThreadNode> = HashMap::new();
    while let Some((level, plan)) = levels.pop() {
        let nodes: Vec<ThreadNode> = level
            .into_iter()
            .map(|thread| to_node(thread, plan, &authors, &below))
            .collect();
        if levels.is_empty() {
            return Ok(nodes);
        }
        below = nodes.into_iter().map(|n| (n.id, n)).collect();
    }
    Ok(Vec::new())
}

fn to_node(
    thread: Thread,
    plan: &Expand,
    authors: &HashMap<Uuid, Author>,
    below: &HashMap<Uuid, ThreadNode>,
) -> ThreadNode {
    let author = match authors.get(&thread.author) {
        Some(author) if plan.author => Ref::Expanded(Box::new(author.clone())),
        _ => Ref::Id(thread.author),
    };
    let children = thread
        .children
        .into_iter()
        .map(|id| match plan.children.and(below.get(&id)) {
            Some(child) => Ref::Expanded(Box::new(child.clone())),
            None => Ref::Id(id),
        })
        .collect();

    ThreadNode {
        id: thread.id,
        text: thread.text,
        author,
        community: thread.community,
        created_at: thread.created_at,
        parent_id: thread.parent_id,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_core::traits::{MockThreadStore, MockUserStore};

    fn author(record_id: Uuid) -> Author {
        Author {
            record_id,
            id: format!("ext-{record_id}"),
            name: "Ada".into(),
            image: None,
        }
    }

    #[test]
    fn plans_have_expected_depths() {
        assert_eq!(AUTHOR_ONLY.depth(), 1);
        assert_eq!(LISTING.depth(), 2);
        assert_eq!(DETAIL.depth(), 3);
        assert_eq!(USER_THREADS.depth(), 2);
    }

    #[tokio::test]
    async fn empty_roots_make_no_store_calls() {
        let threads = MockThreadStore::new();
        let users = MockUserStore::new();
        let nodes = expand(&threads, &users, vec![], &DETAIL).await.unwrap();
        assert!(nodes.is_empty());
    }

    #[tokio::test]
    async fn missing_children_and_authors_stay_as_ids() {
        let writer = Uuid::now_v7();
        let ghost_child = Uuid::now_v7();
        let mut root = Thread::new("root", writer);
        let reply = Thread::reply_to(root.id, "reply", Uuid::now_v7());
        root.children = vec![reply.id, ghost_child];

        let mut threads = MockThreadStore::new();
        let loaded = reply.clone();
        threads
            .expect_find_threads()
            .times(1)
            .returning(move |_| Ok(vec![loaded.clone()]));
        let mut users = MockUserStore::new();
        users
            .expect_find_authors()
            .times(1)
            .returning(move |_| Ok(vec![author(writer)]));

        let nodes = expand(&threads, &users, vec![root], &LISTING).await.unwrap();
        let root = &nodes[0];

        assert_eq!(root.author.expanded().map(|a| a.record_id), Some(writer));
        assert_eq!(root.children.len(), 2);
        let child = root.children[0].expanded().expect("reply expanded");
        assert_eq!(child.author, Ref::Id(reply.author));
        assert_eq!(root.children[1], Ref::Id(ghost_child));
    }

    #[tokio::test]
    async fn roots_keep_their_order() {
        let a = Thread::new("a", Uuid::now_v7());
        let b = Thread::new("b", Uuid::now_v7());
        let threads = MockThreadStore::new();
        let mut users = MockUserStore::new();
        users.expect_find_authors().returning(|_| Ok(vec![]));

        let nodes = expand(&threads, &users, vec![b.clone(), a.clone()], &AUTHOR_ONLY)
            .await
            .unwrap();
        let ids: Vec<_> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }
}

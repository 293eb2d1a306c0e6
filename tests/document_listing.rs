mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{ids, spawn, DocSeed, TestApp};
use doc_vault::authz::{can_view, visibility_predicate, AccessLevel, DocumentContext, Predicate, Role};
use doc_vault::db;

struct Seeded {
    id: i64,
    seed: DocSeed,
}

struct World {
    t: TestApp,
    depts: [i64; 3],
    cats: [i64; 2],
    admin: (i64, String),
    manager: (i64, String),
    colleague: (i64, String),
    employee: (i64, String),
    docs: Vec<Seeded>,
}

/// Three departments, every access level in each, uploaded by four different
/// people. The employee and both managers sit in the second department.
async fn world() -> Result<World> {
    let t = spawn().await?;
    let depts = [t.department("Finance").await?, t.department("Operations").await?, t.department("Legal").await?];
    let cats = [t.category("Policy").await?, t.category("Report").await?];

    let admin = t.user("admin@example.com", depts[0], &[Role::Admin]).await?;
    let manager = t.user("manager@example.com", depts[1], &[Role::Manager, Role::Employee]).await?;
    let colleague = t.user("colleague@example.com", depts[1], &[Role::Manager]).await?;
    let legal = t.user("legal@example.com", depts[2], &[Role::Manager]).await?;
    let employee = t.user("employee@example.com", depts[1], &[Role::Employee]).await?;

    let mut docs = Vec::new();
    let mut n = 0i64;
    for dept in depts {
        for level in AccessLevel::ALL {
            for uploader in [admin.0, manager.0, colleague.0, legal.0] {
                let mut seed = DocSeed::new(&format!("Doc {n:02}"), cats[(n % 2) as usize], dept, uploader, level);
                seed.description = Some(if n % 3 == 0 { "quarterly figures".into() } else { "misc".into() });
                seed.file_size = (n * 37) % 100;
                seed.download_count = (n * 7) % 11;
                seed.created_offset = n;
                let id = t.document(seed.clone()).await?;
                docs.push(Seeded { id, seed });
                n += 1;
            }
        }
    }

    Ok(World {
        t,
        depts,
        cats,
        admin,
        manager,
        colleague,
        employee,
        docs,
    })
}

fn context(doc: &Seeded) -> DocumentContext {
    DocumentContext {
        document_id: doc.id,
        department_id: doc.seed.department_id,
        uploaded_by: doc.seed.uploaded_by,
        access_level: doc.seed.access_level,
    }
}

#[tokio::test]
async fn employee_never_sees_other_departments_documents() -> Result<()> {
    let w = world().await?;
    let token = Some(w.employee.1.as_str());

    let reply = w.t.get("/api/v1/documents?per_page=100", token).await?;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    // 12 public documents plus the 4 department-level ones of their own department
    assert_eq!(body["meta"]["total"], 16);

    let listed = ids(&reply);
    for doc in &w.docs {
        let foreign_department = doc.seed.access_level == AccessLevel::Department && doc.seed.department_id == w.depts[2];
        if foreign_department || doc.seed.access_level == AccessLevel::Private {
            assert!(!listed.contains(&doc.id), "document {} leaked", doc.id);
        }
    }

    // Asking for the other department directly only narrows, never widens.
    let reply = w.t.get(&format!("/api/v1/documents?department_id={}&per_page=100", w.depts[2]), token).await?;
    let body = reply.json();
    assert_eq!(body["meta"]["total"], 4);
    for doc in body["data"].as_array().into_iter().flatten() {
        assert_eq!(doc["access_level"], "public");
    }

    let reply = w.t.get(&format!("/api/v1/documents?department_id={}&access_level=private", w.depts[1]), token).await?;
    assert_eq!(reply.json()["meta"]["total"], 0);
    Ok(())
}

/// One listing request and the page it should produce, evaluated in memory.
#[derive(Debug, Default)]
struct Listing {
    search: Option<&'static str>,
    category_id: Option<i64>,
    department_id: Option<i64>,
    access_level: Option<AccessLevel>,
    sort_by: Option<&'static str>,
    ascending: bool,
    page: Option<i64>,
    per_page: Option<i64>,
}

impl Listing {
    fn uri(&self) -> String {
        let mut params = vec![format!("per_page={}", self.per_page.unwrap_or(100))];
        if let Some(search) = self.search {
            params.push(format!("search={search}"));
        }
        if let Some(id) = self.category_id {
            params.push(format!("category_id={id}"));
        }
        if let Some(id) = self.department_id {
            params.push(format!("department_id={id}"));
        }
        if let Some(level) = self.access_level {
            params.push(format!("access_level={}", level.as_str()));
        }
        if let Some(sort_by) = self.sort_by {
            params.push(format!("sort_by={sort_by}"));
        }
        if self.ascending {
            params.push("sort_order=asc".to_string());
        }
        if let Some(page) = self.page {
            params.push(format!("page={page}"));
        }
        format!("/api/v1/documents?{}", params.join("&"))
    }

    fn selects(&self, doc: &Seeded) -> bool {
        let seed = &doc.seed;
        let searched = self.search.map_or(true, |needle| {
            let needle = needle.to_lowercase();
            seed.title.to_lowercase().contains(&needle)
                || seed.description.as_deref().is_some_and(|d| d.to_lowercase().contains(&needle))
        });
        searched
            && self.category_id.map_or(true, |id| seed.category_id == id)
            && self.department_id.map_or(true, |id| seed.department_id == id)
            && self.access_level.map_or(true, |level| seed.access_level == level)
    }

    /// Expected `(total, ids on the requested page)`.
    fn expected(&self, docs: &[Seeded], predicate: &Predicate) -> (i64, Vec<i64>) {
        let mut matching: Vec<&Seeded> = docs
            .iter()
            .filter(|d| predicate.matches(&context(d)) && self.selects(d))
            .collect();
        matching.sort_by(|a, b| {
            let by_column = match self.sort_by {
                Some("title") => a.seed.title.to_lowercase().cmp(&b.seed.title.to_lowercase()),
                Some("file_size") => a.seed.file_size.cmp(&b.seed.file_size),
                Some("download_count") => a.seed.download_count.cmp(&b.seed.download_count),
                _ => a.seed.created_offset.cmp(&b.seed.created_offset),
            };
            let ordering = by_column.then(a.id.cmp(&b.id));
            if self.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });

        let per_page = self.per_page.unwrap_or(100) as usize;
        let skip = (self.page.unwrap_or(1) as usize - 1) * per_page;
        let page = matching.iter().skip(skip).take(per_page).map(|d| d.id).collect();
        (matching.len() as i64, page)
    }
}

#[tokio::test]
async fn listings_only_return_viewable_documents() -> Result<()> {
    let w = world().await?;
    let listings = [
        Listing::default(),
        Listing {
            search: Some("quarterly"),
            ..Default::default()
        },
        Listing {
            category_id: Some(w.cats[1]),
            ..Default::default()
        },
        Listing {
            department_id: Some(w.depts[0]),
            ..Default::default()
        },
        Listing {
            department_id: Some(w.depts[2]),
            access_level: Some(AccessLevel::Department),
            ..Default::default()
        },
        Listing {
            access_level: Some(AccessLevel::Private),
            ..Default::default()
        },
        Listing {
            access_level: Some(AccessLevel::Department),
            sort_by: Some("title"),
            ascending: true,
            ..Default::default()
        },
        Listing {
            search: Some("Doc"),
            category_id: Some(w.cats[0]),
            access_level: Some(AccessLevel::Public),
            ..Default::default()
        },
        Listing {
            search: Some("quarterly"),
            department_id: Some(w.depts[1]),
            sort_by: Some("file_size"),
            ascending: true,
            ..Default::default()
        },
        Listing {
            sort_by: Some("download_count"),
            page: Some(2),
            per_page: Some(7),
            ..Default::default()
        },
    ];

    for (user_id, token) in [&w.admin, &w.manager, &w.employee, &w.colleague] {
        let principal = db::users::load_principal(&w.t.pool, *user_id).await?;
        let predicate = visibility_predicate(&principal);

        for listing in &listings {
            let uri = listing.uri();
            let reply = w.t.get(&uri, Some(token.as_str())).await?;
            assert_eq!(reply.status, StatusCode::OK, "{uri}");

            let (total, page) = listing.expected(&w.docs, &predicate);
            assert_eq!(reply.json()["meta"]["total"], total, "user {user_id} total for {uri}");
            assert_eq!(ids(&reply), page, "user {user_id} page for {uri}");

            // Managers list colleagues' private documents they cannot open.
            if !principal.is_manager() {
                for id in &page {
                    let doc = w.docs.iter().find(|d| d.id == *id).expect("listed document exists");
                    assert!(can_view(&principal, &context(doc)), "user {user_id} cannot view listed {id}");
                }
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn managers_list_but_cannot_open_colleagues_private_documents() -> Result<()> {
    let w = world().await?;
    let token = Some(w.manager.1.as_str());

    let private = w
        .docs
        .iter()
        .find(|d| {
            d.seed.department_id == w.depts[1]
                && d.seed.access_level == AccessLevel::Private
                && d.seed.uploaded_by == w.colleague.0
        })
        .expect("seeded");

    let reply = w.t.get("/api/v1/documents?per_page=100", token).await?;
    assert_eq!(reply.json()["meta"]["total"], 20);
    assert!(ids(&reply).contains(&private.id));

    let show = w.t.get(&format!("/api/v1/documents/{}", private.id), token).await?;
    assert_eq!(show.status, StatusCode::FORBIDDEN);
    let download = w.t.get(&format!("/api/v1/documents/{}/download", private.id), token).await?;
    assert_eq!(download.status, StatusCode::FORBIDDEN);
    assert_eq!(w.t.download_count(private.id).await?, private.seed.download_count);

    // Their own private upload opens normally.
    let own = w
        .docs
        .iter()
        .find(|d| d.seed.access_level == AccessLevel::Private && d.seed.uploaded_by == w.manager.0)
        .expect("seeded");
    let show = w.t.get(&format!("/api/v1/documents/{}", own.id), token).await?;
    assert_eq!(show.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn admin_sees_everything_newest_first() -> Result<()> {
    let w = world().await?;
    let reply = w.t.get("/api/v1/documents?per_page=100", Some(w.admin.1.as_str())).await?;
    let body = reply.json();
    assert_eq!(body["meta"]["total"], 36);

    let mut expected: Vec<i64> = w.docs.iter().map(|d| d.id).collect();
    expected.reverse();
    assert_eq!(ids(&reply), expected);
    Ok(())
}

#[tokio::test]
async fn sorting_follows_the_requested_column_with_id_tie_break() -> Result<()> {
    let w = world().await?;
    let token = Some(w.admin.1.as_str());

    let reply = w.t.get("/api/v1/documents?per_page=100&sort_by=file_size&sort_order=asc", token).await?;
    let mut expected: Vec<&Seeded> = w.docs.iter().collect();
    expected.sort_by_key(|d| (d.seed.file_size, d.id));
    assert_eq!(ids(&reply), expected.iter().map(|d| d.id).collect::<Vec<_>>());

    let reply = w.t.get("/api/v1/documents?per_page=100&sort_by=download_count", token).await?;
    let mut expected: Vec<&Seeded> = w.docs.iter().collect();
    expected.sort_by_key(|d| std::cmp::Reverse((d.seed.download_count, d.id)));
    assert_eq!(ids(&reply), expected.iter().map(|d| d.id).collect::<Vec<_>>());

    let reply = w.t.get("/api/v1/documents?per_page=100&sort_by=title&sort_order=asc", token).await?;
    let titles: Vec<String> = reply.json()["data"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|d| d["title"].as_str().map(str::to_string))
        .collect();
    let mut sorted = titles.clone();
    sorted.sort_by_key(|t| t.to_lowercase());
    assert_eq!(titles, sorted);

    // Unknown columns fall back to created_at descending.
    let default = w.t.get("/api/v1/documents?per_page=100", token).await?;
    let unknown = w.t.get("/api/v1/documents?per_page=100&sort_by=file_path", token).await?;
    assert_eq!(ids(&default), ids(&unknown));
    Ok(())
}

#[tokio::test]
async fn equal_timestamps_break_ties_by_id() -> Result<()> {
    let t = spawn().await?;
    let dept = t.department("Ops").await?;
    let cat = t.category("Misc").await?;
    let (admin, token) = t.user("admin@example.com", dept, &[Role::Admin]).await?;

    let first = t.document(DocSeed::new("first", cat, dept, admin, AccessLevel::Public)).await?;
    let second = t.document(DocSeed::new("second", cat, dept, admin, AccessLevel::Public)).await?;

    let desc = t.get("/api/v1/documents", Some(token.as_str())).await?;
    assert_eq!(ids(&desc), vec![second, first]);
    let asc = t.get("/api/v1/documents?sort_order=asc", Some(token.as_str())).await?;
    assert_eq!(ids(&asc), vec![first, second]);
    Ok(())
}

#[tokio::test]
async fn pagination_metadata_and_clamping() -> Result<()> {
    let w = world().await?;
    let token = Some(w.employee.1.as_str());

    let full = ids(&w.t.get("/api/v1/documents?per_page=100", token).await?);
    assert_eq!(full.len(), 16);

    let reply = w.t.get("/api/v1/documents?per_page=5&page=2", token).await?;
    let body = reply.json();
    assert_eq!(body["meta"]["current_page"], 2);
    assert_eq!(body["meta"]["last_page"], 4);
    assert_eq!(body["meta"]["per_page"], 5);
    assert_eq!(body["meta"]["total"], 16);
    assert_eq!(ids(&reply), full[5..10].to_vec());

    let body = w.t.get("/api/v1/documents?per_page=500", token).await?.json();
    assert_eq!(body["meta"]["per_page"], 100);

    for raw in ["0", "-3"] {
        let reply = w.t.get(&format!("/api/v1/documents?per_page={raw}"), token).await?;
        let body = reply.json();
        assert_eq!(body["meta"]["per_page"], 1);
        assert_eq!(body["meta"]["last_page"], 16);
        assert_eq!(ids(&reply).len(), 1);
    }

    let body = w.t.get("/api/v1/documents?page=0", token).await?.json();
    assert_eq!(body["meta"]["current_page"], 1);

    let reply = w.t.get("/api/v1/documents?page=9", token).await?;
    assert!(ids(&reply).is_empty());
    assert_eq!(reply.json()["meta"]["total"], 16);
    Ok(())
}

#[tokio::test]
async fn search_is_case_insensitive_and_literal() -> Result<()> {
    let t = spawn().await?;
    let dept = t.department("Ops").await?;
    let cat = t.category("Misc").await?;
    let (admin, token) = t.user("admin@example.com", dept, &[Role::Admin]).await?;

    let percent = t.document(DocSeed::new("Budget 100% final", cat, dept, admin, AccessLevel::Public)).await?;
    let plain = t.document(DocSeed::new("Budget 1000 draft", cat, dept, admin, AccessLevel::Public)).await?;
    let mut seed = DocSeed::new("Minutes", cat, dept, admin, AccessLevel::Public);
    seed.description = Some("covers the budget review".into());
    let described = t.document(seed).await?;

    let reply = t.get("/api/v1/documents?search=BUDGET&sort_order=asc", Some(token.as_str())).await?;
    assert_eq!(ids(&reply), vec![percent, plain, described]);

    let reply = t.get("/api/v1/documents?search=100%25", Some(token.as_str())).await?;
    assert_eq!(ids(&reply), vec![percent]);

    let reply = t.get("/api/v1/documents?search=0_d", Some(token.as_str())).await?;
    assert!(ids(&reply).is_empty());

    // Case folding is not limited to ASCII.
    let accented = t.document(DocSeed::new("Études annuelles", cat, dept, admin, AccessLevel::Public)).await?;
    for needle in ["%C3%A9tudes", "%C3%89TUDES"] {
        let reply = t.get(&format!("/api/v1/documents?search={needle}"), Some(token.as_str())).await?;
        assert_eq!(ids(&reply), vec![accented], "{needle}");
    }

    // Renaming refreshes what search matches.
    let renamed = t
        .json("PATCH", &format!("/api/v1/documents/{plain}"), Some(token.as_str()), json!({ "title": "Überblick" }))
        .await?;
    assert_eq!(renamed.status, StatusCode::OK);
    let reply = t.get("/api/v1/documents?search=%C3%BCBERBLICK", Some(token.as_str())).await?;
    assert_eq!(ids(&reply), vec![plain]);
    let reply = t.get("/api/v1/documents?search=1000", Some(token.as_str())).await?;
    assert!(ids(&reply).is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_parameters_are_rejected() -> Result<()> {
    let w = world().await?;
    let token = Some(w.employee.1.as_str());

    for (query, field) in [
        ("category_id=abc", "category_id"),
        ("category_id=9999", "category_id"),
        ("department_id=two", "department_id"),
        ("access_level=secret", "access_level"),
        ("page=x", "page"),
        ("per_page=1.5", "per_page"),
    ] {
        let reply = w.t.get(&format!("/api/v1/documents?{query}"), token).await?;
        assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY, "{query}");
        assert!(reply.json()["errors"][field].is_array(), "{query}");
    }

    let reply = w
        .t
        .get("/api/v1/documents?search=&category_id=&department_id=&access_level=&sort_by=&page=", token)
        .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["meta"]["total"], 16);
    Ok(())
}

#[tokio::test]
async fn listing_requires_a_token() -> Result<()> {
    let t = spawn().await?;
    let reply = t.get("/api/v1/documents", None).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = t.get("/api/v1/documents", Some("not-a-jwt")).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

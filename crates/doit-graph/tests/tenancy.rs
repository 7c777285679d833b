use doit_graph::{IssueFilter, NewIssue, Scope, Store, StoreError};

#[test]
fn api_keys_resolve_until_revoked() {
    let store = Store::open_in_memory().unwrap();
    let acme = store.create_tenant("Acme", "acme").unwrap();
    store.create_tenant("Globex", "globex").unwrap();

    let issued = store.issue_api_key("acme", "ci runner").unwrap();
    assert_eq!(issued.raw_key.len(), 64);
    assert!(issued.raw_key.starts_with(&issued.info.prefix));

    let resolved = store.resolve_api_key(&issued.raw_key).unwrap();
    assert_eq!(resolved.id, acme.id);

    let keys = store.list_api_keys("acme").unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].label, "ci runner");
    assert!(store.list_api_keys("globex").unwrap().is_empty());

    store.revoke_api_key(&issued.info.prefix).unwrap();
    let err = store.resolve_api_key(&issued.raw_key).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "api key", .. }));
    assert!(store.list_api_keys("acme").unwrap()[0].is_revoked());

    // Second revoke finds nothing live.
    assert!(store.revoke_api_key(&issued.info.prefix).is_err());
    assert!(store.resolve_api_key("not-a-key").is_err());
}

#[test]
fn tenant_slugs_are_unique_and_validated() {
    let store = Store::open_in_memory().unwrap();
    store.create_tenant("Acme", "acme").unwrap();
    assert!(matches!(
        store.create_tenant("Acme again", "acme").unwrap_err(),
        StoreError::Validation(_)
    ));
    assert!(matches!(
        store.create_tenant("Bad", "Not A Slug").unwrap_err(),
        StoreError::Validation(_)
    ));
    assert_eq!(store.list_tenants().unwrap().len(), 1);
}

#[test]
fn project_scope_narrows_visibility() {
    let store = Store::open_in_memory().unwrap();
    let tenant = store.create_tenant("Acme", "acme").unwrap();
    let scope = Scope::tenant(tenant.id);
    let web = store.create_project(&scope, "Web", "web").unwrap();
    let infra = store.create_project(&scope, "Infra", "infra").unwrap();

    for (id, project) in [("doit-w1", web.id), ("doit-i1", infra.id)] {
        store
            .create_issue(
                &scope,
                NewIssue {
                    project_id: Some(project),
                    ..NewIssue::new(id, id)
                },
            )
            .unwrap();
    }
    store
        .create_issue(&scope, NewIssue::new("doit-loose", "no project"))
        .unwrap();

    let web_only = Scope::tenant(tenant.id).with_projects([web.id]);
    let listed: Vec<String> = store
        .list_issues(&web_only, &IssueFilter::new())
        .unwrap()
        .into_iter()
        .map(|issue| issue.id)
        .collect();
    assert_eq!(listed, vec!["doit-w1"]);
    assert_eq!(store.list_issues(&scope, &IssueFilter::new()).unwrap().len(), 3);

    let renamed = store
        .update_project(&scope, web.id, Some("Website"), None)
        .unwrap();
    assert_eq!(renamed.name, "Website");
    assert_eq!(renamed.slug, "web");
    assert!(
        store
            .update_project(&scope, web.id, None, Some("infra"))
            .is_err()
    );
    assert_eq!(store.project_by_slug(&scope, "web").unwrap().id, web.id);

    let other = Scope::tenant(store.create_tenant("Globex", "globex").unwrap().id);
    let err = store
        .create_issue(
            &other,
            NewIssue {
                project_id: Some(web.id),
                ..NewIssue::new("doit-steal", "cross tenant")
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "project", .. }));
}

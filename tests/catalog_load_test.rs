use anyhow::Result;
use async_trait::async_trait;
use catalog_loader::config::LoaderConfig;
use catalog_loader::constants::{MULTIPLE_DIRECTORS_ID, NEEDS_REVISION_RATING_ID};
use catalog_loader::domain::{AssociationKind, Content, EntityKind, RawRecord};
use catalog_loader::observer::{CollectingObserver, LoadEvent};
use catalog_loader::reader::read_catalog;
use catalog_loader::storage::{InMemoryStorage, SqliteStorage, Storage};
use catalog_loader::{LoadReport, Loader, LoaderError};
use std::io::Write;
use tempfile::tempdir;

const HEADER: &str =
    "show_id,type,title,director,cast,country,date_added,release_year,rating,duration,listed_in,description\n";

fn s5() -> RawRecord {
    RawRecord {
        show_id: "s5".into(),
        format: "Movie".into(),
        title: "Two Hands".into(),
        director: "Jane Doe, John Roe".into(),
        cast: "".into(),
        country: "USA".into(),
        date_added: "January 1, 2020".into(),
        release_year: "2019".into(),
        rating: "".into(),
        duration: "95 min".into(),
        listed_in: "Comedy, Drama".into(),
        description: "A film by two people.".into(),
    }
}

fn catalog() -> Vec<RawRecord> {
    vec![
        s5(),
        RawRecord {
            show_id: "s6".into(),
            format: "TV Show".into(),
            title: "Shared Cast".into(),
            director: "NULL".into(),
            cast: "Ann Lee, Bo Kim".into(),
            country: "USA, Canada".into(),
            date_added: "January 1, 2020".into(),
            release_year: "2018".into(),
            rating: "TV-MA".into(),
            duration: "2 Seasons".into(),
            listed_in: "Drama".into(),
            description: "NULL".into(),
        },
        RawRecord {
            show_id: "s7".into(),
            format: "Movie".into(),
            title: "Solo".into(),
            director: "Jane Doe".into(),
            cast: "Bo Kim".into(),
            country: "".into(),
            date_added: "not a date".into(),
            release_year: "".into(),
            rating: "PG".into(),
            duration: "80 min".into(),
            listed_in: "Comedy".into(),
            description: "".into(),
        },
    ]
}

async fn load(storage: &dyn Storage, records: &[RawRecord], config: LoaderConfig) -> Result<LoadReport> {
    let observer = CollectingObserver::new();
    let mut loader = Loader::new(storage, &observer, config);
    Ok(loader.load(records).await?)
}

/// Full table contents, for comparing two states of a store.
async fn snapshot(storage: &dyn Storage) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for id in storage.list_content_ids().await? {
        lines.push(format!("content {:?}", storage.get_content(id).await?));
        lines.push(format!("availability {} {:?}", id, storage.get_availability(id).await?));
    }
    for kind in EntityKind::ALL {
        lines.push(format!("{kind} {:?}", storage.list_entities(kind).await?));
    }
    for kind in AssociationKind::ALL {
        lines.push(format!("{kind} {:?}", storage.list_edges(kind).await?));
    }
    Ok(lines)
}

async fn assert_end_to_end(storage: &dyn Storage) -> Result<()> {
    let report = load(storage, &[s5()], LoaderConfig::default()).await?;
    assert_eq!(report.anchors_inserted, 1);

    let content = storage.get_content(5).await?.expect("anchor 5 exists");
    assert_eq!(content.director, Some(MULTIPLE_DIRECTORS_ID));
    assert_eq!(content.rating, NEEDS_REVISION_RATING_ID);
    assert_eq!(content.genre, 6);
    assert_eq!(content.release_year, Some(2019));
    assert_eq!(storage.get_availability(5).await?, Some(1));

    let jane = storage.find_entity(EntityKind::Director, "Jane Doe").await?.unwrap();
    let john = storage.find_entity(EntityKind::Director, "John Roe").await?.unwrap();
    assert_eq!(
        storage.list_edges(AssociationKind::ContentDirector).await?,
        vec![(5, jane.min(john)), (5, jane.max(john))]
    );

    let usa = storage.find_entity(EntityKind::Country, "USA").await?.unwrap();
    assert_eq!(storage.list_edges(AssociationKind::ContentCountry).await?, vec![(5, usa)]);

    let comedy = storage.find_entity(EntityKind::Tag, "Comedy").await?.unwrap();
    let drama = storage.find_entity(EntityKind::Tag, "Drama").await?.unwrap();
    assert_eq!(
        storage.list_edges(AssociationKind::ContentTag).await?,
        vec![(5, comedy), (5, drama)]
    );
    assert_eq!(
        storage.list_edges(AssociationKind::GenreTag).await?,
        vec![(6, comedy), (6, drama)]
    );

    let release = storage.find_entity(EntityKind::Release, "2020-01-01").await?.unwrap();
    assert_eq!(storage.list_edges(AssociationKind::ContentRelease).await?, vec![(5, release)]);

    assert!(storage.list_edges(AssociationKind::ContentActor).await?.is_empty());
    assert!(storage.list_entities(EntityKind::Actor).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_end_to_end_in_memory() -> Result<()> {
    let storage = InMemoryStorage::new();
    assert_end_to_end(&storage).await
}

#[tokio::test]
async fn test_end_to_end_sqlite() -> Result<()> {
    let temp_dir = tempdir()?;
    let storage = SqliteStorage::open(temp_dir.path().join("catalog.db"))?;
    assert_end_to_end(&storage).await
}

#[tokio::test]
async fn test_second_run_changes_nothing() -> Result<()> {
    let temp_dir = tempdir()?;
    let storage = SqliteStorage::open(temp_dir.path().join("catalog.db"))?;

    let first = load(&storage, &catalog(), LoaderConfig::default()).await?;
    let after_first = snapshot(&storage).await?;
    let counts_first = storage.table_counts().await?;

    let second = load(&storage, &catalog(), LoaderConfig::default()).await?;
    assert_eq!(snapshot(&storage).await?, after_first);
    assert_eq!(storage.table_counts().await?, counts_first);

    assert_eq!(first.anchors_inserted, 3);
    assert_eq!(second.anchors_inserted, 0);
    assert_eq!(second.anchors_skipped, 3);
    for kind in EntityKind::ALL {
        assert_eq!(second.entities[&kind].created, 0, "{kind} created on rerun");
    }
    Ok(())
}

#[tokio::test]
async fn test_relinking_rerun_is_idempotent() -> Result<()> {
    let storage = InMemoryStorage::new();
    let relink = LoaderConfig {
        relink_existing: true,
        ..LoaderConfig::default()
    };

    load(&storage, &catalog(), relink.clone()).await?;
    let before = snapshot(&storage).await?;
    let report = load(&storage, &catalog(), relink).await?;

    assert_eq!(snapshot(&storage).await?, before);
    for kind in AssociationKind::ALL {
        assert_eq!(report.edges_inserted(kind), 0, "{kind} edge duplicated");
    }
    assert_eq!(report.edges_skipped(AssociationKind::ContentTag), 4);
    assert_eq!(report.edges_skipped(AssociationKind::ContentDirector), 2);
    Ok(())
}

#[tokio::test]
async fn test_shared_entities_resolve_to_one_row() -> Result<()> {
    let storage = InMemoryStorage::new();
    load(&storage, &catalog(), LoaderConfig::default()).await?;

    // s6 and s7 share Bo Kim; s5 and s7 share Jane Doe
    let actors = storage.list_entities(EntityKind::Actor).await?;
    assert_eq!(actors.len(), 2);
    let bo = storage.find_entity(EntityKind::Actor, "Bo Kim").await?.unwrap();
    let actor_edges = storage.list_edges(AssociationKind::ContentActor).await?;
    assert!(actor_edges.contains(&(6, bo)));
    assert!(actor_edges.contains(&(7, bo)));

    let jane = storage.find_entity(EntityKind::Director, "Jane Doe").await?.unwrap();
    let solo = storage.get_content(7).await?.unwrap();
    assert_eq!(solo.director, Some(jane));

    // both records added on the same day share one release row
    assert_eq!(storage.list_entities(EntityKind::Release).await?.len(), 1);

    // s6 has no director; s7's date is unparseable
    assert_eq!(storage.get_content(6).await?.unwrap().director, None);
    assert!(!storage
        .list_edges(AssociationKind::ContentRelease)
        .await?
        .iter()
        .any(|(content, _)| *content == 7));

    // genre 7 for s6 and 8 for s7
    let genre_edges = storage.list_edges(AssociationKind::GenreTag).await?;
    let drama = storage.find_entity(EntityKind::Tag, "Drama").await?.unwrap();
    let comedy = storage.find_entity(EntityKind::Tag, "Comedy").await?.unwrap();
    assert!(genre_edges.contains(&(7, drama)));
    assert!(genre_edges.contains(&(8, comedy)));
    Ok(())
}

#[tokio::test]
async fn test_interrupted_run_resumes_with_fresh_resolvers() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("catalog.db");
    let records = catalog();

    {
        let storage = SqliteStorage::open(&path)?;
        load(&storage, &records[..1], LoaderConfig::default()).await?;
    }

    let storage = SqliteStorage::open(&path)?;
    let report = load(&storage, &records, LoaderConfig::default()).await?;
    assert_eq!(report.anchors_skipped, 1);
    assert_eq!(report.anchors_inserted, 2);
    // Jane Doe came from the first run's rows
    assert_eq!(report.entities[&EntityKind::Director].created, 0);
    assert!(report.entities[&EntityKind::Director].store_hits >= 1);

    let fresh = InMemoryStorage::new();
    load(&fresh, &records, LoaderConfig::default()).await?;
    assert_eq!(storage.table_counts().await?, fresh.table_counts().await?);
    Ok(())
}

#[tokio::test]
async fn test_reads_catalog_file() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("Data.csv");
    let mut file = std::fs::File::create(&path)?;
    write!(
        file,
        "{HEADER}\
         s5,Movie,Two Hands,\"Jane Doe, John Roe\",,USA,\"January 1, 2020\",2019,,95 min,\"Comedy, Drama\",A film\n\
         s6,Movie,Broken,,,,,,,\n\
         x,Movie,Bad Id,,,,,,,,,\n"
    )?;
    drop(file);

    let batch = read_catalog(&path)?;
    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.unreadable.len(), 1);

    let storage = InMemoryStorage::new();
    let observer = CollectingObserver::new();
    let mut loader = Loader::new(&storage, &observer, LoaderConfig::default());
    let report = loader.load_batch(&batch).await?;

    assert_eq!(report.records_read, 3);
    assert_eq!(report.records_rejected, 2);
    assert_eq!(report.anchors_inserted, 1);
    assert_eq!(storage.list_content_ids().await?, vec![5]);
    let rejected: Vec<LoadEvent> = observer
        .events()
        .into_iter()
        .filter(|event| matches!(event, LoadEvent::RecordRejected { .. }))
        .collect();
    // the short row is reported by its CSV line, the bad id by batch position
    assert_eq!(rejected.len(), report.records_rejected);
    assert!(matches!(&rejected[0], LoadEvent::RecordRejected { row: 3, .. }));
    assert!(matches!(&rejected[1], LoadEvent::RecordRejected { row: 2, .. }));

    let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty()?)?;
    assert_eq!(json["records_rejected"], 2);
    assert_eq!(json["edges"]["content_tag"]["inserted"], 2);
    Ok(())
}

#[tokio::test]
async fn test_long_director_and_repeated_id_in_one_batch() -> Result<()> {
    let temp_dir = tempdir()?;
    let storage = SqliteStorage::open(temp_dir.path().join("catalog.db"))?;

    let long_director = "Directed collectively by the members of the Lisbon Film Cooperative \
                         working from an unfinished script left by its founder";
    assert!(long_director.len() > 100 && !long_director.contains(','));

    let first = RawRecord {
        show_id: "s1".into(),
        director: long_director.into(),
        country: "USA".into(),
        ..s5()
    };
    let repeat = RawRecord {
        show_id: "s1".into(),
        director: "A, B".into(),
        country: "Canada".into(),
        listed_in: "Horror".into(),
        ..s5()
    };

    let report = load(&storage, &[first, repeat], LoaderConfig::default()).await?;
    assert_eq!(report.anchors_inserted, 1);
    assert_eq!(report.anchors_skipped, 1);

    // the long value is one director row, never a country row
    let director = storage
        .find_entity(EntityKind::Director, long_director)
        .await?
        .expect("long director stored as a director");
    assert_eq!(storage.list_entities(EntityKind::Director).await?.len(), 2);
    assert_eq!(storage.find_entity(EntityKind::Country, long_director).await?, None);

    let content = storage.get_content(1).await?.expect("anchor 1 exists");
    assert_eq!(content.director, Some(director));
    assert!(storage.list_edges(AssociationKind::ContentDirector).await?.is_empty());

    // the repeated id contributed nothing
    assert_eq!(storage.list_content_ids().await?, vec![1]);
    assert_eq!(storage.get_availability(1).await?, Some(1));
    assert_eq!(
        storage.list_entities(EntityKind::Country).await?,
        vec![(1, "USA".to_string())]
    );
    assert_eq!(storage.find_entity(EntityKind::Director, "A").await?, None);
    assert_eq!(storage.find_entity(EntityKind::Tag, "Horror").await?, None);
    Ok(())
}

/// Delegates to an in-memory store but refuses actor edges.
struct ActorEdgesDown {
    inner: InMemoryStorage,
}

#[async_trait]
impl Storage for ActorEdgesDown {
    async fn find_entity(&self, kind: EntityKind, key: &str) -> catalog_loader::Result<Option<i64>> {
        self.inner.find_entity(kind, key).await
    }
    async fn insert_entity(&self, kind: EntityKind, key: &str) -> catalog_loader::Result<i64> {
        self.inner.insert_entity(kind, key).await
    }
    async fn content_exists(&self, content_id: i64) -> catalog_loader::Result<bool> {
        self.inner.content_exists(content_id).await
    }
    async fn insert_content(&self, content: &Content) -> catalog_loader::Result<()> {
        self.inner.insert_content(content).await
    }
    async fn insert_availability(&self, content_id: i64, availability: i64) -> catalog_loader::Result<()> {
        self.inner.insert_availability(content_id, availability).await
    }
    async fn edge_exists(&self, kind: AssociationKind, left: i64, right: i64) -> catalog_loader::Result<bool> {
        self.inner.edge_exists(kind, left, right).await
    }
    async fn insert_edge(&self, kind: AssociationKind, left: i64, right: i64) -> catalog_loader::Result<()> {
        if kind == AssociationKind::ContentActor {
            return Err(LoaderError::storage("content_actors is read-only"));
        }
        self.inner.insert_edge(kind, left, right).await
    }
    async fn get_content(&self, content_id: i64) -> catalog_loader::Result<Option<Content>> {
        self.inner.get_content(content_id).await
    }
    async fn get_availability(&self, content_id: i64) -> catalog_loader::Result<Option<i64>> {
        self.inner.get_availability(content_id).await
    }
    async fn list_content_ids(&self) -> catalog_loader::Result<Vec<i64>> {
        self.inner.list_content_ids().await
    }
    async fn list_entities(&self, kind: EntityKind) -> catalog_loader::Result<Vec<(i64, String)>> {
        self.inner.list_entities(kind).await
    }
    async fn list_edges(&self, kind: AssociationKind) -> catalog_loader::Result<Vec<(i64, i64)>> {
        self.inner.list_edges(kind).await
    }
}

#[tokio::test]
async fn test_failed_pass_does_not_stop_the_others() -> Result<()> {
    let storage = ActorEdgesDown {
        inner: InMemoryStorage::new(),
    };
    let observer = CollectingObserver::new();
    let mut loader = Loader::new(&storage, &observer, LoaderConfig::default());

    let err = loader.load(&catalog()).await.unwrap_err();
    match err {
        LoaderError::AssociationPasses { failures } => {
            assert_eq!(failures.len(), 1);
            assert!(failures[0].starts_with("content_actor"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(storage.list_edges(AssociationKind::ContentActor).await?.is_empty());
    assert_eq!(storage.list_edges(AssociationKind::ContentTag).await?.len(), 4);
    assert!(!storage.list_edges(AssociationKind::ContentRelease).await?.is_empty());
    assert!(observer.events().iter().any(|event| matches!(
        event,
        LoadEvent::PassFailed {
            kind: AssociationKind::ContentActor,
            ..
        }
    )));
    Ok(())
}

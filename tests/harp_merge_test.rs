use solar_etl::{EtlEngine, HarpMergePipeline, LocalStorage, TomlConfig};
use tempfile::TempDir;

const LOOKUP: &str = "HARPNUM NOAA_ARS
1028 11283,11284
1200 11374
1300 11400
";

const AR_CSV: &str = "NOAA Active region number,HARP number ,CME date and time
11374,,14/12/2011 20.58.00
11400,,needs to be after 06:12 on 03/01/2012
11500,,05/02/2012 10.00.00
";

#[tokio::test]
async fn test_merge_writes_indexed_csv() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("all_harps_with_noaa_ars.txt"), LOOKUP).unwrap();
    std::fs::write(temp_dir.path().join("ARs_and_times.csv"), AR_CSV).unwrap();

    let mut config = TomlConfig::default();
    config.paths.data_dir = temp_dir.path().display().to_string();

    let storage = LocalStorage::new(temp_dir.path());
    let engine = EtlEngine::new(HarpMergePipeline::new(storage, config));

    let location = engine.run().await.unwrap();
    assert!(location.ends_with("ARs_and_times_w_HARP_NUM.csv"));

    let merged = std::fs::read_to_string(temp_dir.path().join("ARs_and_times_w_HARP_NUM.csv")).unwrap();
    let lines: Vec<&str> = merged.lines().collect();

    assert_eq!(lines[0], ",NOAA Active region number,CME date and time,HARP number");
    assert_eq!(lines[1], "0,11374,14/12/2011 20.58.00,1200");
    assert_eq!(lines[2], "1,11400,needs to be after 06:12 on 03/01/2012,1300");
    assert_eq!(lines[3], "2,11500,05/02/2012 10.00.00,");
    assert_eq!(lines.len(), 4);
}

#[tokio::test]
async fn test_merge_fails_without_lookup_file() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("ARs_and_times.csv"), AR_CSV).unwrap();

    let storage = LocalStorage::new(temp_dir.path());
    let engine = EtlEngine::new(HarpMergePipeline::new(storage, TomlConfig::default()));

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, solar_etl::EtlError::IoError(_)));
}

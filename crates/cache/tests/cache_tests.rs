use vega_cache::MemCache;
use vega_core::cache::port::{Cache, CacheExt, trading_paused_key};

#[tokio::test]
async fn test_mem_cache_raw_ops() {
    let cache = MemCache::new();
    let key = "raw_key";
    let value = vec![1, 2, 3, 4];

    // 测试存取
    cache.set_raw(key, value.clone()).await.unwrap();
    let result = cache.get_raw(key).await.unwrap().unwrap();
    assert_eq!(result, value);

    // 测试删除
    cache.del(key).await.unwrap();
    let result = cache.get_raw(key).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_trading_pause_flag_round_trip() {
    let cache = MemCache::new();
    let key = trading_paused_key("u1");

    // 暂停 = 写入标志，恢复 = 删除标志
    cache.set(&key, &true).await.unwrap();
    let paused: Option<bool> = cache.get(&key).await.unwrap();
    assert_eq!(paused, Some(true));

    cache.del(&key).await.unwrap();
    let paused: Option<bool> = cache.get(&key).await.unwrap();
    assert!(paused.is_none());

    // 不同用户的标志互不影响
    let other: Option<bool> = cache.get(&trading_paused_key("u2")).await.unwrap();
    assert!(other.is_none());
}

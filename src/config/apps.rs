//! App display name to package lookup, plus keyword hints for on-device search.

use once_cell::sync::Lazy;
use std::collections::HashMap;

const APP_TABLE: &[(&str, &str)] = &[
    // Social & messaging
    ("微信", "com.tencent.mm"),
    ("QQ", "com.tencent.mobileqq"),
    ("微博", "com.sina.weibo"),
    ("飞书", "com.ss.android.lark"),
    ("QQ邮箱", "com.tencent.androidqqmail"),
    // Shopping & payment
    ("淘宝", "com.taobao.taobao"),
    ("京东", "com.jingdong.app.mall"),
    ("拼多多", "com.xunmeng.pinduoduo"),
    ("支付宝", "com.eg.android.AlipayGphone"),
    ("闲鱼", "com.taobao.idlefish"),
    // Lifestyle
    ("小红书", "com.xingin.xhs"),
    ("知乎", "com.zhihu.android"),
    ("豆瓣", "com.douban.frodo"),
    ("美团", "com.sankuai.meituan"),
    ("大众点评", "com.dianping.v1"),
    ("饿了么", "me.ele"),
    ("今日头条", "com.ss.android.article.news"),
    // Maps & travel
    ("高德地图", "com.autonavi.minimap"),
    ("百度地图", "com.baidu.BaiduMap"),
    ("滴滴", "com.sdu.didi.psnger"),
    ("滴滴出行", "com.sdu.didi.psnger"),
    ("携程", "ctrip.android.view"),
    ("飞猪", "com.taobao.trip"),
    ("12306", "com.MobileTicket"),
    ("铁路12306", "com.MobileTicket"),
    // Video & music
    ("抖音", "com.ss.android.ugc.aweme"),
    ("快手", "com.smile.gifmaker"),
    ("哔哩哔哩", "tv.danmaku.bili"),
    ("B站", "tv.danmaku.bili"),
    ("bilibili", "tv.danmaku.bili"),
    ("爱奇艺", "com.qiyi.video"),
    ("腾讯视频", "com.tencent.qqlive"),
    ("优酷", "com.youku.phone"),
    ("网易云音乐", "com.netease.cloudmusic"),
    ("QQ音乐", "com.tencent.qqmusic"),
    ("喜马拉雅", "com.ximalaya.ting.android"),
    // Games
    ("星穹铁道", "com.miHoYo.hkrpg"),
    // System
    ("设置", "com.android.settings"),
    ("Settings", "com.android.settings"),
    ("相机", "com.android.camera"),
    ("Camera", "com.android.camera"),
    ("相册", "com.android.gallery3d"),
    ("Gallery", "com.android.gallery3d"),
    ("日历", "com.android.calendar"),
    ("Calendar", "com.android.calendar"),
    ("时钟", "com.android.deskclock"),
    ("Clock", "com.android.deskclock"),
    ("计算器", "com.android.calculator2"),
    ("Calculator", "com.android.calculator2"),
    ("文件管理", "com.android.fileexplorer"),
    ("Files", "com.android.fileexplorer"),
    ("联系人", "com.android.contacts"),
    ("Contacts", "com.android.contacts"),
    ("短信", "com.android.mms"),
    ("Messages", "com.android.mms"),
    ("电话", "com.android.dialer"),
    ("Phone", "com.android.dialer"),
    ("应用商店", "com.android.vending"),
    ("Play Store", "com.android.vending"),
    // Google
    ("Chrome", "com.android.chrome"),
    ("Gmail", "com.google.android.gm"),
    ("Google Maps", "com.google.android.apps.maps"),
    ("YouTube", "com.google.android.youtube"),
];

/// Package-name fragments for apps whose display name shares nothing with
/// their package id. Matched when the key is a substring of the app name.
const KEYWORD_HINTS: &[(&str, &[&str])] = &[
    ("剑网3", &["jx3", "jianwang", "seasun"]),
    ("王者荣耀", &["sgame", "honor", "kings"]),
    ("原神", &["genshin", "mihoyo"]),
    ("崩坏", &["honkai", "mihoyo", "bh3"]),
    ("阴阳师", &["onmyoji", "netease"]),
    ("明日方舟", &["arknights", "hypergryph"]),
    ("和平精英", &["pubg", "tencent", "peacekeeper"]),
    ("英雄联盟", &["lol", "league", "tencent"]),
    ("穿越火线", &["crossfire", "cf"]),
];

/// Mapping from app display names to Android package names.
pub static APP_PACKAGES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| APP_TABLE.iter().copied().collect());

/// Get the package name for an app by its display name.
///
/// Exact match first, then a case-insensitive match for Latin names.
pub fn get_package(app_name: &str) -> Option<&'static str> {
    let name = app_name.trim();
    APP_PACKAGES.get(name).copied().or_else(|| {
        APP_TABLE
            .iter()
            .find(|(display, _)| display.eq_ignore_ascii_case(name))
            .map(|(_, package)| *package)
    })
}

/// Keywords to match against installed package ids when searching for
/// `app_name` on the device. The name itself always comes first.
pub fn keyword_hints(app_name: &str) -> Vec<String> {
    let mut keywords = vec![app_name.trim().to_lowercase()];
    for (name, hints) in KEYWORD_HINTS {
        if app_name.contains(name) {
            keywords.extend(hints.iter().map(|h| h.to_string()));
        }
    }
    keywords
}
